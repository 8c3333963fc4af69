//! Persisted settings: the rule list, the key-value stores that hold it and
//! the editor that is its only writer.
//!
//! The record is stored as a flat JSON object, one entry per key, the same
//! shape the browser extension keeps in its synced storage:
//!
//! ```json
//! { "customRules": [ { "id": "...", "name": "...", "enabled": true,
//!                      "pattern": "...", "embedTemplate": "...", "isPreset": false } ],
//!   "theme": "auto" }
//! ```
//!
//! Two stores ship with the crate:
//!
//! - [`FsStore`] -- one JSON file on disk.
//! - [`MemoryStore`] -- a shared in-memory map.
//!
//! Implement [`SettingsStore`] to plug in another backend.

mod book;
mod fs;
mod memory;
mod notify;
mod presets;

pub use book::RuleBook;
pub use fs::FsStore;
pub use memory::MemoryStore;
pub use notify::{Message, Notifier};
pub use presets::{heal_presets, presets};

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Storage key of the rule list.
pub const CUSTOM_RULES_KEY: &str = "customRules";
/// Storage key of the UI theme.
pub const THEME_KEY: &str = "theme";
/// Boolean key written by releases that only knew the Kinescope embed.
pub const LEGACY_KINESCOPE_KEY: &str = "kinescopeEmbed";

/// A user-visible rule mapping a URL pattern to an embed template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Stable unique id. Presets use fixed `preset-*` literals.
    pub id: String,
    /// Display label, not used for matching.
    #[serde(default)]
    pub name: String,
    /// Disabled rules are never compiled.
    pub enabled: bool,
    /// Regular expression searched anywhere in the link URL.
    pub pattern: String,
    /// Embed markup or URL with `{{match}}` / `{{matchN}}` placeholders.
    pub embed_template: String,
    /// Presets can be toggled but not edited or deleted.
    #[serde(default)]
    pub is_preset: bool,
}

/// Colour scheme of the settings UI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
}

/// The full persisted settings record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub custom_rules: Vec<Rule>,
    #[serde(default)]
    pub theme: Theme,
}

/// Asynchronous key-value backend holding the settings record.
///
/// Implementations must be `Send + Sync + 'static` so a store can be shared
/// between the rule editor and engine start-up code.
///
/// # Implementing a custom backend
///
/// ```rust,no_run
/// use serde_json::{Map, Value};
/// use tana_tweaks::{Result, SettingsStore};
///
/// struct ReadOnlyStore(Map<String, Value>);
///
/// impl SettingsStore for ReadOnlyStore {
///     async fn get(&self, key: &str) -> Result<Option<Value>> {
///         Ok(self.0.get(key).cloned())
///     }
///     async fn set(&self, _entries: Map<String, Value>) -> Result<()> {
///         Ok(())
///     }
///     async fn remove(&self, _key: &str) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait SettingsStore: Send + Sync + 'static {
    /// Read the value stored under `key`, `None` if absent.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Merge `entries` into the record, overwriting existing keys.
    fn set(&self, entries: Map<String, Value>) -> impl Future<Output = Result<()>> + Send;

    /// Delete `key` from the record. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Load a settings snapshot for the engine.
///
/// Read-only: missing keys fall back to their defaults (no rules, automatic
/// theme) and nothing is written back. An unrecognised theme value is read
/// as [`Theme::Auto`]; a malformed rule list is an error.
pub async fn read<S: SettingsStore>(store: &S) -> Result<Settings> {
    let custom_rules = match store.get(CUSTOM_RULES_KEY).await? {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => serde_json::from_value(value)?,
    };
    let theme = store
        .get(THEME_KEY)
        .await?
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();

    Ok(Settings {
        custom_rules,
        theme,
    })
}
