use color_eyre::Result;
use tokio::sync::mpsc;
use tuya_lights::{
    protocols::https::mk_hyper_https_client,
    reconciler::Reconciler,
    sampler::{
        start_sampler_loop, BackgroundStore, ColorUpdate, JsonFileStore, MemoryStore,
        SamplerEngine, SamplerHandle, TargetStore,
    },
    settings::{read_settings, Settings},
    tuya::{
        client::TuyaClient,
        polling::{start_color_forward_loop, start_state_poll_loop},
    },
};

fn start_notification_loop(reconciler: &Reconciler<TuyaClient>) {
    let mut notifications = reconciler.subscribe();

    tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) => log::warn!("{}", notification.message),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Missed {skipped} notifications")
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Starts the sampler for the configured listening groups and forwards its
/// colours to the groups.
fn start_color_listening(
    settings: &Settings,
    reconciler: &Reconciler<TuyaClient>,
) -> Option<SamplerHandle> {
    if settings.sampler.listen_groups.is_empty() {
        return None;
    }

    let store: Box<dyn TargetStore> = match &settings.sampler.target_store {
        Some(path) => Box::new(BackgroundStore::spawn(JsonFileStore::new(path))),
        None => Box::new(MemoryStore::default()),
    };

    let engine = SamplerEngine::new(&settings.sampler, store);
    let (updates, received) = mpsc::unbounded_channel::<ColorUpdate>();
    let handle = start_sampler_loop(&settings.sampler, engine, updates);
    start_color_forward_loop(reconciler, received);

    Some(handle)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    pretty_env_logger::init();

    let settings = read_settings()?;
    let https_client = mk_hyper_https_client(&settings)?;
    let reconciler = Reconciler::new(TuyaClient::new(&settings, &https_client));

    reconciler.refresh().await?;
    log::info!(
        "Found {} devices and {} groups",
        reconciler.devices().await.len(),
        reconciler.groups().await.len()
    );

    start_state_poll_loop(&settings, &reconciler);
    start_notification_loop(&reconciler);
    let sampler = start_color_listening(&settings, &reconciler);

    tokio::signal::ctrl_c().await?;

    if let Some(sampler) = sampler {
        sampler.stop();
    }

    Ok(())
}
