//! Key-value persistence for session state.
//!
//! Activity state is mirrored so it survives restarts. Storage is a
//! convenience: every failure is logged and the tracker carries on with
//! its in-memory state.

mod file_store;

pub use file_store::FileStore;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::error::StorageError;
use crate::metrics::record_storage_failure;

const LAST_ACTIVITY_KEY: &str = "session.last_activity";
const WARNING_SHOWN_KEY: &str = "session.warning_shown";

/// String key-value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Typed, failure-tolerant view of the tracker's mirrored state.
#[derive(Clone, Default)]
pub struct SessionMirror {
    store: Option<Arc<dyn KeyValueStore>>,
}

impl SessionMirror {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store: Some(store) }
    }

    /// A mirror that stores nothing.
    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        let raw = self.read(LAST_ACTIVITY_KEY)?;
        match raw.parse::<i64>() {
            Ok(millis) => Utc.timestamp_millis_opt(millis).single(),
            Err(e) => {
                warn!(
                    key = LAST_ACTIVITY_KEY,
                    value = %raw,
                    error = %e,
                    "Ignoring malformed stored value"
                );
                None
            }
        }
    }

    pub fn save_last_activity(&self, at: DateTime<Utc>) {
        self.write(LAST_ACTIVITY_KEY, &at.timestamp_millis().to_string());
    }

    pub fn warning_shown(&self) -> bool {
        self.read(WARNING_SHOWN_KEY).as_deref() == Some("true")
    }

    pub fn save_warning_shown(&self, shown: bool) {
        self.write(WARNING_SHOWN_KEY, if shown { "true" } else { "false" });
    }

    pub fn clear(&self) {
        let Some(store) = &self.store else { return };
        for key in [LAST_ACTIVITY_KEY, WARNING_SHOWN_KEY] {
            if let Err(e) = store.remove(key) {
                warn!(key, error = %e, "Failed to clear stored session state");
                record_storage_failure("remove");
            }
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        let store = self.store.as_ref()?;
        match store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read stored session state");
                record_storage_failure("get");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store.set(key, value) {
            warn!(key, error = %e, "Failed to store session state");
            record_storage_failure("set");
        }
    }
}
