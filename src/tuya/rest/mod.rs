use futures::future::join_all;

use self::{device::Device, group::Group};
use crate::{error::Result, tuya::client::LightingBackend};

pub mod common;
pub mod device;
pub mod group;

#[derive(Clone, Debug, Default)]
pub struct TuyaState {
    pub devices: Vec<Device>,
    pub groups: Vec<Group>,
}

impl TuyaState {
    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn device_mut(&mut self, id: &str) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.id == id)
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn group_mut(&mut self, id: &str) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.id == id)
    }
}

/// Reads devices, groups and each group's status set and properties.
///
/// The group listing carries neither, so every group is followed up with its
/// own status and properties reads, issued together. A group whose read fails
/// is kept with what the other read returned rather than failing the whole
/// refresh.
pub async fn get_tuya_state<B: LightingBackend + ?Sized>(backend: &B) -> Result<TuyaState> {
    let (devices, mut groups) = futures::try_join!(backend.get_devices(), backend.get_groups())?;

    let details = join_all(groups.iter().map(|g| async move {
        futures::join!(
            backend.fetch_group_status(&g.id),
            backend.fetch_group_properties(&g.id)
        )
    }))
    .await;

    for (group, (status, properties)) in groups.iter_mut().zip(details) {
        match status {
            Ok(status) => group.status = status,
            Err(e) => log::warn!("Keeping group {} without status: {e}", group.id),
        }
        match properties {
            Ok(properties) => group.properties = properties,
            Err(e) => log::warn!("Keeping group {} without properties: {e}", group.id),
        }
    }

    Ok(TuyaState { devices, groups })
}
