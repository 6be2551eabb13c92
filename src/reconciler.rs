use std::sync::Arc;

use tokio::{
    sync::{broadcast, RwLock},
    task::JoinHandle,
};

use crate::{
    color::NormalizedHsv,
    commands::{device_commands, group_properties, Intent},
    error::{Error, Result, TargetKind},
    status::{upsert_status, Schema, StatusEntry},
    tuya::{
        client::LightingBackend,
        rest::{device::Device, get_tuya_state, group::Group, TuyaState},
    },
};

const NOTIFICATION_CAPACITY: usize = 32;

/// Transient message about a write that did not go through.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub kind: TargetKind,
    pub id: String,
    pub message: String,
}

/// Handle to a write dispatched in the background. Dropping it does not
/// cancel the write.
#[derive(Debug)]
pub struct PendingWrite {
    kind: TargetKind,
    id: String,
    handle: JoinHandle<Result<()>>,
}

impl PendingWrite {
    /// Waits for the write and, if it failed, for the refresh that follows.
    pub async fn wait(self) -> Result<()> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                let path = match self.kind {
                    TargetKind::Device => format!("/devices/{}/commands", self.id),
                    TargetKind::Group => format!("/groups/{}/properties", self.id),
                };
                Err(Error::transport("POST", path, None, e))
            }
        }
    }
}

/// Local view of every device and group, updated optimistically on each
/// action and brought back to remote truth by a full refresh whenever a
/// write fails.
pub struct Reconciler<B> {
    backend: Arc<B>,
    state: Arc<RwLock<TuyaState>>,
    schema: Arc<Schema>,
    notifications: broadcast::Sender<Notification>,
}

impl<B> Clone for Reconciler<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            state: self.state.clone(),
            schema: self.schema.clone(),
            notifications: self.notifications.clone(),
        }
    }
}

impl<B: LightingBackend + 'static> Reconciler<B> {
    pub fn new(backend: B) -> Self {
        Self::with_schema(backend, Schema::default())
    }

    pub fn with_schema(backend: B, schema: Schema) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Self {
            backend: Arc::new(backend),
            state: Arc::new(RwLock::new(TuyaState::default())),
            schema: Arc::new(schema),
            notifications,
        }
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Replaces the whole local state with a fresh read. The lock is only
    /// taken once the read has completed.
    pub async fn refresh(&self) -> Result<()> {
        let state = get_tuya_state(self.backend.as_ref()).await?;
        *self.state.write().await = state;
        Ok(())
    }

    pub async fn devices(&self) -> Vec<Device> {
        self.state.read().await.devices.clone()
    }

    pub async fn groups(&self) -> Vec<Group> {
        self.state.read().await.groups.clone()
    }

    pub async fn device(&self, id: &str) -> Option<Device> {
        self.state.read().await.device(id).cloned()
    }

    pub async fn group(&self, id: &str) -> Option<Group> {
        self.state.read().await.group(id).cloned()
    }

    pub async fn toggle_device(&self, id: &str) -> Result<PendingWrite> {
        self.act(TargetKind::Device, id, |current_on| Intent::Toggle { current_on })
            .await
    }

    pub async fn set_brightness(&self, id: &str, value: i64) -> Result<PendingWrite> {
        self.act(TargetKind::Device, id, |_| Intent::Brightness(value))
            .await
    }

    pub async fn set_color(&self, id: &str, color: NormalizedHsv) -> Result<PendingWrite> {
        self.act(TargetKind::Device, id, |_| Intent::Color(color))
            .await
    }

    pub async fn toggle_group(&self, id: &str) -> Result<PendingWrite> {
        self.act(TargetKind::Group, id, |current_on| Intent::Toggle { current_on })
            .await
    }

    pub async fn set_group_brightness(&self, id: &str, value: i64) -> Result<PendingWrite> {
        self.act(TargetKind::Group, id, |_| Intent::Brightness(value))
            .await
    }

    pub async fn set_group_color(&self, id: &str, color: NormalizedHsv) -> Result<PendingWrite> {
        self.act(TargetKind::Group, id, |_| Intent::Color(color))
            .await
    }

    /// Computes the entries for `intent`, applies them locally and dispatches
    /// the write. Nothing is dispatched if the target is unknown or an entry
    /// fails validation.
    async fn act(
        &self,
        kind: TargetKind,
        id: &str,
        intent: impl FnOnce(bool) -> Intent,
    ) -> Result<PendingWrite> {
        let unknown = || Error::UnknownTarget {
            kind,
            id: id.to_string(),
        };

        let entries = {
            let mut state = self.state.write().await;

            let (current_on, status) = match kind {
                TargetKind::Device => {
                    let device = state.device_mut(id).ok_or_else(unknown)?;
                    (device.is_on(), &mut device.status)
                }
                TargetKind::Group => {
                    let group = state.group_mut(id).ok_or_else(unknown)?;
                    (group.is_on(), &mut group.status)
                }
            };

            let entries = match kind {
                TargetKind::Device => device_commands(intent(current_on), &self.schema)?,
                TargetKind::Group => group_properties(intent(current_on), &self.schema)?,
            };

            for entry in &entries {
                upsert_status(status, entry.clone());
            }

            entries
        };

        log::debug!("Dispatching to {kind} {id}: {entries:?}");

        Ok(self.dispatch(kind, id.to_string(), entries))
    }

    fn dispatch(&self, kind: TargetKind, id: String, entries: Vec<StatusEntry>) -> PendingWrite {
        let reconciler = self.clone();
        let target_id = id.clone();

        let handle = tokio::spawn(async move {
            let result = match kind {
                TargetKind::Device => reconciler.backend.send_commands(&id, &entries).await,
                TargetKind::Group => reconciler.backend.send_properties(&id, &entries).await,
            };

            if let Err(e) = &result {
                log::warn!("Write to {kind} {id} failed, refreshing state: {e}");

                // No receivers is fine
                let _ = reconciler.notifications.send(Notification {
                    kind,
                    id: id.clone(),
                    message: format!("Failed to update {kind} {id}: {e}"),
                });

                if let Err(e) = reconciler.refresh().await {
                    log::error!("Refresh after failed write to {kind} {id} failed: {e}");
                }
            }

            result
        });

        PendingWrite {
            kind,
            id: target_id,
            handle,
        }
    }
}
