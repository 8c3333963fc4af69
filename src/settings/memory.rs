//! In-memory settings backend.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::settings::{CUSTOM_RULES_KEY, SettingsStore, Settings, THEME_KEY};

/// Settings store backed by a shared in-memory map.
///
/// Clones share the same record, which makes it the natural store for a
/// host that keeps settings in its own process and for tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    record: Arc<Mutex<Map<String, Value>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `settings`.
    pub fn with_settings(settings: &Settings) -> Result<Self> {
        let mut record = Map::new();
        record.insert(
            CUSTOM_RULES_KEY.into(),
            serde_json::to_value(&settings.custom_rules)?,
        );
        record.insert(THEME_KEY.into(), serde_json::to_value(settings.theme)?);
        Ok(Self {
            record: Arc::new(Mutex::new(record)),
        })
    }
}

impl SettingsStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.record.lock().await.get(key).cloned())
    }

    async fn set(&self, entries: Map<String, Value>) -> Result<()> {
        self.record.lock().await.extend(entries);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.record.lock().await.remove(key);
        Ok(())
    }
}
