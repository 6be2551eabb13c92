use std::time::Duration;

use tokio::{sync::mpsc, task::JoinHandle};

use super::client::LightingBackend;
use crate::{reconciler::Reconciler, sampler::ColorUpdate, settings::Settings};

/// Periodically refresh the reconciler state from the backend.
///
/// Changes made outside this process (vendor app, wall switches, scenes) are
/// only ever seen through this loop. A failed poll leaves the previous state
/// in place and is retried on the next tick.
pub fn start_state_poll_loop<B: LightingBackend + 'static>(
    settings: &Settings,
    reconciler: &Reconciler<B>,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(settings.polling.interval_seconds);
    let reconciler = reconciler.clone();

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            if let Err(e) = reconciler.refresh().await {
                log::error!("Polling state failed: {e}");
            }
        }
    })
}

/// Hands sampled colours to their groups through the same optimistic path as
/// manual edits. Ends once the sampler drops its sender.
pub fn start_color_forward_loop<B: LightingBackend + 'static>(
    reconciler: &Reconciler<B>,
    mut updates: mpsc::UnboundedReceiver<ColorUpdate>,
) -> JoinHandle<()> {
    let reconciler = reconciler.clone();

    tokio::spawn(async move {
        while let Some(ColorUpdate { group_id, color }) = updates.recv().await {
            // Write failures are reported through notifications
            if let Err(e) = reconciler.set_group_color(&group_id, color).await {
                log::error!("Could not forward colour to group {group_id}: {e}");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::{
        color::DeviceHsv,
        error::TargetKind,
        mock::{device, group, MockBackend},
        sampler::{start_sampler_loop, MemoryStore, SamplerEngine},
        settings::{test_settings, SamplerSettings},
        status::{codes, StatusEntry},
    };

    #[tokio::test(start_paused = true)]
    async fn picks_up_remote_changes() {
        let backend = MockBackend::new(
            vec![device("d1", vec![StatusEntry::new(codes::SWITCH_LED, false)])],
            vec![],
        );
        let reconciler = Reconciler::new(backend);
        reconciler.refresh().await.unwrap();

        let settings = test_settings("http://localhost:3000");
        let handle = start_state_poll_loop(&settings, &reconciler);

        // Someone switches the lamp on from elsewhere
        reconciler
            .backend()
            .remote
            .lock()
            .unwrap()
            .device_mut("d1")
            .unwrap()
            .status = vec![StatusEntry::new(codes::SWITCH_LED, true)];

        assert!(!reconciler.device("d1").await.unwrap().is_on());

        tokio::time::sleep(Duration::from_secs(settings.polling.interval_seconds + 1)).await;
        assert!(reconciler.device("d1").await.unwrap().is_on());

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_polling_after_failures() {
        let reconciler = Reconciler::new(MockBackend::new(vec![], vec![]));
        reconciler.backend().fail_reads.store(true, Ordering::SeqCst);

        let settings = test_settings("http://localhost:3000");
        let handle = start_state_poll_loop(&settings, &reconciler);

        tokio::time::sleep(Duration::from_secs(3 * settings.polling.interval_seconds + 1)).await;

        // At least one read per tick
        assert!(reconciler.backend().reads.load(Ordering::SeqCst) >= 3);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn forwards_sampled_colours_to_groups() {
        let backend = MockBackend::new(
            vec![],
            vec![group("g1", vec![StatusEntry::new(codes::WORK_MODE, "white")])],
        );
        let reconciler = Reconciler::new(backend);
        reconciler.refresh().await.unwrap();

        // Solid red surface under the default target position
        let settings = SamplerSettings {
            width: 100,
            height: 80,
            listen_groups: vec!["g1".to_string()],
            ..Default::default()
        };
        let engine = SamplerEngine::new(&settings, Box::new(MemoryStore::default()));
        let (updates, received) = mpsc::unbounded_channel();
        let sampler = start_sampler_loop(&settings, engine, updates);
        let forward = start_color_forward_loop(&reconciler, received);

        tokio::time::sleep(Duration::from_millis(settings.sample_interval_ms + 100)).await;

        assert_eq!(
            reconciler.backend().sent(),
            vec![(
                TargetKind::Group,
                "g1".to_string(),
                vec![
                    StatusEntry::new(codes::WORK_MODE, "colour"),
                    StatusEntry::new(codes::COLOUR_DATA, "000003e803e8"),
                ]
            )]
        );

        let local = reconciler.group("g1").await.unwrap();
        assert_eq!(local.work_mode(), "colour");
        assert_eq!(local.color(), DeviceHsv::new(0, 1000, 1000));

        sampler.stop();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(forward.is_finished());
    }
}
