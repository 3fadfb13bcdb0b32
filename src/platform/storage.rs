//! Key-value storage and the typed `Stored<T>` handle

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Synchronization state of the storage with its backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Synced,
    Offline,
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Syncing => write!(f, "syncing"),
            Self::Synced => write!(f, "synced"),
            Self::Offline => write!(f, "offline"),
            Self::Error => write!(f, "error"),
        }
    }
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Writes locally and schedules any remote sync. Never blocks on the network.
    fn set(&self, key: &str, value: serde_json::Value);

    fn sync_status(&self) -> SyncStatus;

    /// Bumped whenever stored values change from outside `set` (e.g. a remote pull).
    fn revision(&self) -> u64 {
        0
    }
}

/// Typed view over one key of a [`KeyValueStore`].
pub struct Stored<T> {
    key: String,
    value: T,
    default: T,
    revision: u64,
    store: Arc<dyn KeyValueStore>,
}

/// Reads `key` from the store, falling back to `default` when the key is
/// missing or its value doesn't deserialize as `T`.
pub fn use_storage<T>(store: Arc<dyn KeyValueStore>, key: &str, default: T) -> Stored<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    let revision = store.revision();
    let value = load(store.as_ref(), key).unwrap_or_else(|| default.clone());
    Stored {
        key: key.to_string(),
        value,
        default,
        revision,
        store,
    }
}

fn load<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_value(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "Stored value has unexpected shape, using default");
            None
        }
    }
}

impl<T> Stored<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, value: T) {
        match serde_json::to_value(&value) {
            Ok(raw) => self.store.set(&self.key, raw),
            Err(e) => warn!(key = %self.key, error = %e, "Failed to serialize stored value"),
        }
        self.value = value;
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.store.sync_status()
    }

    /// Reloads the value if the store changed underneath us. Returns true on reload.
    pub fn refresh(&mut self) -> bool {
        let revision = self.store.revision();
        if revision == self.revision {
            return false;
        }
        self.revision = revision;
        self.value = load(self.store.as_ref(), &self.key).unwrap_or_else(|| self.default.clone());
        true
    }
}
