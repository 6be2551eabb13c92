use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::{
    color::DeviceHsv,
    error::{Error, Result, TargetKind},
    protocols::https::{mk_get_request, mk_post_request, HyperHttpsClient},
    settings::Settings,
    status::{codes, find_status, StatusEntry, StatusValue},
};

use super::common::TuyaResponse;

#[derive(Builder, Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[builder(setter(into, strip_option), default)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub status: Vec<StatusEntry>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
}

impl Device {
    pub fn is_on(&self) -> bool {
        find_status(&self.status, codes::SWITCH_LED)
            .and_then(StatusValue::as_bool)
            .unwrap_or(false)
    }

    pub fn brightness(&self) -> Option<i64> {
        find_status(&self.status, codes::BRIGHT_VALUE_V2).and_then(StatusValue::as_integer)
    }

    pub fn color(&self) -> DeviceHsv {
        find_status(&self.status, codes::COLOUR_DATA_V2)
            .and_then(StatusValue::as_colour)
            .unwrap_or(DeviceHsv::new(0, 0, 1000))
    }
}

#[derive(Deserialize, Debug, Clone)]
struct DevicesResult {
    devices: Vec<Device>,
}

#[derive(Serialize, Debug, Clone)]
struct CommandsRequest<'a> {
    commands: &'a [StatusEntry],
}

pub async fn get_devices(settings: &Settings, client: &HyperHttpsClient) -> Result<Vec<Device>> {
    let path = "/devices";
    let response: TuyaResponse<DevicesResult> = mk_get_request(client, settings, path)
        .await
        .inspect_err(|e| log::error!("Error while fetching devices: {e}"))?;

    Ok(response.into_result("GET", path)?.devices)
}

/// The proxy has no per device status route, so this reads the device list
/// and picks the device out of it.
pub async fn get_device_status(
    settings: &Settings,
    client: &HyperHttpsClient,
    device_id: &str,
) -> Result<Vec<StatusEntry>> {
    let devices = get_devices(settings, client).await?;

    devices
        .into_iter()
        .find(|d| d.id == device_id)
        .map(|d| d.status)
        .ok_or_else(|| Error::UnknownTarget {
            kind: TargetKind::Device,
            id: device_id.to_string(),
        })
}

pub async fn post_device_commands(
    settings: &Settings,
    client: &HyperHttpsClient,
    device_id: &str,
    commands: &[StatusEntry],
) -> Result<()> {
    let path = format!("/devices/{device_id}/commands");
    let body = CommandsRequest { commands };

    let result = async {
        let response: TuyaResponse<serde_json::Value> =
            mk_post_request(client, settings, &path, &body).await?;
        response.check("POST", &path)
    }
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!(
                "Error while sending commands to device {device_id}: {e}\n{:#?}",
                commands
            );
            Err(e)
        }
    }
}
