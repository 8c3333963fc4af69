//! Error types for the `tana_tweaks` crate.

/// All errors that can occur while loading settings, editing rules or
/// driving the embed engine.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// A settings backend failed to read or write.
    #[error("Settings storage failed: {0}")]
    Storage(Box<dyn std::error::Error + Send + Sync>),

    /// The persisted settings record could not be decoded or encoded.
    #[error("Malformed settings record: {0}")]
    Settings(#[from] serde_json::Error),

    /// The engine task has stopped or its queue is full.
    #[error("Channel closed or full")]
    ChannelClosed,

    /// The engine task panicked or was aborted.
    #[error("Engine task failed: {0}")]
    Engine(String),

    /// A rule submitted through the rule editor failed validation.
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Preset rules can be toggled but not edited or deleted.
    #[error("Preset rule {0} cannot be modified")]
    PresetLocked(String),

    /// No rule with the given id exists.
    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    /// A CSS selector could not be parsed.
    #[error("Invalid selector {0}")]
    Selector(String),

    /// The builder configuration is invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// Target discovery over the debugging endpoint failed.
    #[cfg(feature = "runner")]
    #[error("Debugger endpoint request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The debugging WebSocket failed.
    #[cfg(feature = "runner")]
    #[error("Debugger connection failed: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The debugged page replied with a protocol error.
    #[cfg(feature = "runner")]
    #[error("Protocol error: {0}")]
    Cdp(String),
}

/// A type alias for `Result<T, EmbedError>`.
pub type Result<T> = std::result::Result<T, EmbedError>;
