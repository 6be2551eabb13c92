use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use color_eyre::Result;
use eyre::eyre;
use tokio::sync::watch;

use super::engine::Position;

pub type TargetPositions = BTreeMap<String, Position>;

/// Persistence for sample target positions. Loaded once when the engine is
/// built and overwritten wholesale on every change.
pub trait TargetStore: Send {
    fn load(&self) -> Result<TargetPositions>;
    fn save(&mut self, positions: &TargetPositions) -> Result<()>;
}

/// Positions kept as a JSON object keyed by group id.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TargetStore for JsonFileStore {
    fn load(&self) -> Result<TargetPositions> {
        if !self.path.exists() {
            return Ok(TargetPositions::new());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let de = &mut serde_json::Deserializer::from_str(&contents);
        serde_path_to_error::deserialize(de)
            .map_err(|e| eyre!("Invalid target store {}: {e}", self.path.display()))
    }

    fn save(&mut self, positions: &TargetPositions) -> Result<()> {
        let contents = serde_json::to_string_pretty(positions)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

/// Shared in-memory store, handy when nothing should touch the disk.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    positions: Arc<Mutex<TargetPositions>>,
}

impl MemoryStore {
    pub fn snapshot(&self) -> TargetPositions {
        self.positions
            .lock()
            .map(|positions| positions.clone())
            .unwrap_or_default()
    }
}

impl TargetStore for MemoryStore {
    fn load(&self) -> Result<TargetPositions> {
        Ok(self.snapshot())
    }

    fn save(&mut self, positions: &TargetPositions) -> Result<()> {
        let mut stored = self
            .positions
            .lock()
            .map_err(|_| eyre!("Target store lock poisoned"))?;
        *stored = positions.clone();
        Ok(())
    }
}

/// Hands saves to a blocking task so the sampler never waits on the disk.
/// Saves that pile up while a write is running collapse into the newest one.
pub struct BackgroundStore<S> {
    reader: S,
    latest: watch::Sender<TargetPositions>,
}

impl<S: TargetStore + Clone + 'static> BackgroundStore<S> {
    /// Starts the writer task. Must be called from within a tokio runtime.
    pub fn spawn(store: S) -> Self {
        let (latest, mut pending) = watch::channel(TargetPositions::new());
        let mut writer = store.clone();

        tokio::spawn(async move {
            while pending.changed().await.is_ok() {
                let positions = pending.borrow_and_update().clone();
                let mut store = writer;

                let saved = tokio::task::spawn_blocking(move || {
                    let result = store.save(&positions);
                    (store, result)
                })
                .await;

                match saved {
                    Ok((store, result)) => {
                        if let Err(e) = result {
                            log::warn!("Could not save sample targets: {e}");
                        }
                        writer = store;
                    }
                    Err(e) => {
                        log::error!("Sample target writer stopped: {e}");
                        break;
                    }
                }
            }
        });

        Self {
            reader: store,
            latest,
        }
    }
}

impl<S: TargetStore> TargetStore for BackgroundStore<S> {
    fn load(&self) -> Result<TargetPositions> {
        self.reader.load()
    }

    fn save(&mut self, positions: &TargetPositions) -> Result<()> {
        self.latest.send_replace(positions.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_and_overwrites() {
        let path = std::env::temp_dir().join(format!(
            "tuya-lights-targets-{}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let mut store = JsonFileStore::new(&path);
        assert!(store.load().unwrap().is_empty());

        let mut positions = TargetPositions::new();
        positions.insert("g1".to_string(), Position::new(10.0, 20.0));
        positions.insert("g2".to_string(), Position::new(0.0, 400.0));
        store.save(&positions).unwrap();
        assert_eq!(store.load().unwrap(), positions);

        positions.remove("g2");
        store.save(&positions).unwrap();
        assert_eq!(store.load().unwrap(), positions);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let path = std::env::temp_dir().join(format!(
            "tuya-lights-corrupt-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"g1": {"x": "left"}}"#).unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("g1.x"), "{err}");

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn background_store_writes_newest_positions() {
        let inner = MemoryStore::default();
        let mut saved = TargetPositions::new();
        saved.insert("g1".to_string(), Position::new(1.0, 1.0));
        inner.clone().save(&saved).unwrap();

        let mut store = BackgroundStore::spawn(inner.clone());
        assert_eq!(store.load().unwrap(), saved);

        let mut positions = TargetPositions::new();
        for i in 0..50 {
            positions.insert("g1".to_string(), Position::new(i as f32, 2.0));
            store.save(&positions).unwrap();
        }

        for _ in 0..200 {
            if inner.snapshot() == positions {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(inner.snapshot(), positions);
    }
}
