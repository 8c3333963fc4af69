//! Settings-change broadcast to running engines.

use serde::{Deserialize, Serialize};

use crate::handle::EngineSender;
use crate::settings::Settings;

/// Cross-context message delivered to engines.
///
/// Serialized with a `type` tag, so a settings update travels as
/// `{"type":"SETTINGS_UPDATED","settings":{...}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// The full settings record after an edit.
    SettingsUpdated { settings: Settings },
}

/// Fans settings updates out to every subscribed engine.
///
/// Delivery is best-effort: an engine that has gone away (its page navigated
/// or shut down) is dropped from the list and the failure is not reported.
#[derive(Clone, Default)]
pub struct Notifier {
    subscribers: Vec<EngineSender>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine to receive future updates.
    pub fn subscribe(&mut self, sender: EngineSender) {
        self.subscribers.push(sender);
    }

    /// Number of engines currently subscribed.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Send `settings` to every subscriber, returning how many accepted it.
    pub fn broadcast(&mut self, settings: &Settings) -> usize {
        let mut delivered = 0;
        self.subscribers.retain(|sender| {
            let message = Message::SettingsUpdated {
                settings: settings.clone(),
            };
            match sender.notify(message) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(e) => {
                    tracing::debug!("Dropping engine from settings broadcast: {e}");
                    !sender.is_closed()
                }
            }
        });
        delivered
    }
}
