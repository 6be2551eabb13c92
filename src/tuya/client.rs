use async_trait::async_trait;
use serde_json::{Map, Value};

use super::rest::{
    device::{get_device_status, get_devices, post_device_commands, Device},
    group::{get_group_properties, get_group_status, get_groups, post_group_properties, Group},
};
use crate::{
    error::Result,
    protocols::https::HyperHttpsClient,
    settings::Settings,
    status::StatusEntry,
};

/// Single-shot reads and writes against the backend. Nothing here retries;
/// the caller decides what a failure means.
#[async_trait]
pub trait LightingBackend: Send + Sync {
    async fn get_devices(&self) -> Result<Vec<Device>>;

    async fn get_groups(&self) -> Result<Vec<Group>>;

    async fn fetch_device_status(&self, device_id: &str) -> Result<Vec<StatusEntry>>;

    async fn fetch_group_status(&self, group_id: &str) -> Result<Vec<StatusEntry>>;

    async fn fetch_group_properties(&self, group_id: &str) -> Result<Map<String, Value>>;

    /// Devices are written through the commands route.
    async fn send_commands(&self, device_id: &str, commands: &[StatusEntry]) -> Result<()>;

    /// Groups are written through the properties route.
    async fn send_properties(&self, group_id: &str, properties: &[StatusEntry]) -> Result<()>;
}

#[derive(Clone)]
pub struct TuyaClient {
    settings: Settings,
    client: HyperHttpsClient,
}

impl TuyaClient {
    pub fn new(settings: &Settings, client: &HyperHttpsClient) -> Self {
        Self {
            settings: settings.clone(),
            client: client.clone(),
        }
    }
}

#[async_trait]
impl LightingBackend for TuyaClient {
    async fn get_devices(&self) -> Result<Vec<Device>> {
        get_devices(&self.settings, &self.client).await
    }

    async fn get_groups(&self) -> Result<Vec<Group>> {
        get_groups(&self.settings, &self.client).await
    }

    async fn fetch_device_status(&self, device_id: &str) -> Result<Vec<StatusEntry>> {
        get_device_status(&self.settings, &self.client, device_id).await
    }

    async fn fetch_group_status(&self, group_id: &str) -> Result<Vec<StatusEntry>> {
        get_group_status(&self.settings, &self.client, group_id).await
    }

    async fn fetch_group_properties(&self, group_id: &str) -> Result<Map<String, Value>> {
        get_group_properties(&self.settings, &self.client, group_id).await
    }

    async fn send_commands(&self, device_id: &str, commands: &[StatusEntry]) -> Result<()> {
        post_device_commands(&self.settings, &self.client, device_id, commands).await
    }

    async fn send_properties(&self, group_id: &str, properties: &[StatusEntry]) -> Result<()> {
        post_group_properties(&self.settings, &self.client, group_id, properties).await
    }
}
