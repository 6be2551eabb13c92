use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{
    error::{Error, Result, TargetKind},
    status::{upsert_status, StatusEntry},
    tuya::{
        client::LightingBackend,
        rest::{
            device::{Device, DeviceBuilder},
            group::{Group, GroupBuilder},
            TuyaState,
        },
    },
};

/// In-memory backend holding the "remote truth".
#[derive(Default)]
pub struct MockBackend {
    pub remote: Mutex<TuyaState>,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
    pub fail_group_status: AtomicBool,
    pub reads: AtomicUsize,
    pub sent: Mutex<Vec<(TargetKind, String, Vec<StatusEntry>)>>,
}

impl MockBackend {
    pub fn new(devices: Vec<Device>, groups: Vec<Group>) -> Self {
        Self {
            remote: Mutex::new(TuyaState { devices, groups }),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(TargetKind, String, Vec<StatusEntry>)> {
        self.sent.lock().unwrap().clone()
    }

    fn read(&self, path: &str) -> Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::transport("GET", path, Some(502), "proxy unavailable"));
        }
        Ok(())
    }

    fn write(
        &self,
        kind: TargetKind,
        id: &str,
        path: String,
        entries: &[StatusEntry],
    ) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((kind, id.to_string(), entries.to_vec()));

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::transport("POST", path, Some(500), "device offline"));
        }

        let mut remote = self.remote.lock().unwrap();
        let status = match kind {
            TargetKind::Device => remote.device_mut(id).map(|d| &mut d.status),
            TargetKind::Group => remote.group_mut(id).map(|g| &mut g.status),
        };

        let status = status.ok_or_else(|| Error::UnknownTarget {
            kind,
            id: id.to_string(),
        })?;

        for entry in entries {
            upsert_status(status, entry.clone());
        }

        Ok(())
    }
}

#[async_trait]
impl LightingBackend for MockBackend {
    async fn get_devices(&self) -> Result<Vec<Device>> {
        self.read("/devices")?;
        Ok(self.remote.lock().unwrap().devices.clone())
    }

    async fn get_groups(&self) -> Result<Vec<Group>> {
        self.read("/groups")?;
        // The listing never carries status or properties
        Ok(self
            .remote
            .lock()
            .unwrap()
            .groups
            .iter()
            .map(|g| Group {
                status: vec![],
                properties: Map::new(),
                ..g.clone()
            })
            .collect())
    }

    async fn fetch_device_status(&self, device_id: &str) -> Result<Vec<StatusEntry>> {
        self.read("/devices")?;
        self.remote
            .lock()
            .unwrap()
            .device(device_id)
            .map(|d| d.status.clone())
            .ok_or_else(|| Error::UnknownTarget {
                kind: TargetKind::Device,
                id: device_id.to_string(),
            })
    }

    async fn fetch_group_status(&self, group_id: &str) -> Result<Vec<StatusEntry>> {
        let path = format!("/groups/{group_id}/status");
        self.read(&path)?;
        if self.fail_group_status.load(Ordering::SeqCst) {
            return Err(Error::transport("GET", path, Some(504), "gateway timeout"));
        }
        self.remote
            .lock()
            .unwrap()
            .group(group_id)
            .map(|g| g.status.clone())
            .ok_or_else(|| Error::UnknownTarget {
                kind: TargetKind::Group,
                id: group_id.to_string(),
            })
    }

    async fn fetch_group_properties(&self, group_id: &str) -> Result<Map<String, Value>> {
        self.read(&format!("/groups/{group_id}/properties"))?;
        Ok(self
            .remote
            .lock()
            .unwrap()
            .group(group_id)
            .map(|g| g.properties.clone())
            .unwrap_or_default())
    }

    async fn send_commands(&self, device_id: &str, commands: &[StatusEntry]) -> Result<()> {
        let path = format!("/devices/{device_id}/commands");
        self.write(TargetKind::Device, device_id, path, commands)
    }

    async fn send_properties(&self, group_id: &str, properties: &[StatusEntry]) -> Result<()> {
        let path = format!("/groups/{group_id}/properties");
        self.write(TargetKind::Group, group_id, path, properties)
    }
}

pub fn device(id: &str, status: Vec<StatusEntry>) -> Device {
    DeviceBuilder::default()
        .id(id)
        .name(format!("Device {id}"))
        .online(true)
        .status(status)
        .build()
        .unwrap()
}

pub fn group(id: &str, status: Vec<StatusEntry>) -> Group {
    GroupBuilder::default()
        .id(id)
        .name(format!("Group {id}"))
        .member_count(2u32)
        .status(status)
        .build()
        .unwrap()
}
