//! # tana_tweaks
//!
//! Turns plain links to video and media hosts into inline embeds on a
//! live HTML page, driven by user-editable URL rules.
//!
//! ## Overview
//!
//! A rule pairs a regular expression with an embed template. The engine
//! compiles the enabled rules, scans the page for unprocessed links that
//! could match, expands the first matching rule's template with the
//! captured groups, and inserts the resulting frame next to the link,
//! hiding the link itself. Every link is handled at most once.
//!
//! The engine runs as a background task that owns the [`Page`]. The host
//! reports its own DOM changes as [`Mutation`]s, and rule edits made
//! through a [`RuleBook`] reach every subscribed engine as a
//! `SETTINGS_UPDATED` [`Message`]. Each batch of queued changes triggers
//! at most one scan.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tana_tweaks::{EngineBuilder, MemoryStore, Mutation, Page, RuleBook};
//!
//! # async fn example() -> tana_tweaks::Result<()> {
//! let store = MemoryStore::new();
//! let mut book = RuleBook::open(store.clone()).await?;
//! book.set_enabled("preset-loom", true).await?;
//!
//! let page = Page::at("https://app.tana.inc/", r#"<div id="root"></div>"#)?;
//! let engine = EngineBuilder::new(store, page).start().await?;
//! book.subscribe(engine.sender());
//!
//! engine.mutate(vec![Mutation::Append {
//!     parent: "#root".into(),
//!     html: r#"<a href="https://www.loom.com/share/abc123">demo</a>"#.into(),
//! }])?;
//!
//! let page = engine.shutdown().await?;
//! assert!(page.html().contains("tana-tweaks-embed"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `runner` | **yes** | Enables [`runner`] and the `tana-tweaks-runner` binary, which inject the engine into a desktop host over its remote debugging port. |

pub mod config;
pub mod dom;
pub mod error;
pub mod handle;
pub mod rules;
#[cfg(feature = "runner")]
pub mod runner;
pub mod scanner;
pub mod settings;
mod worker;

pub use config::EngineBuilder;
pub use dom::{HostLayout, Mutation, Page, Placement};
pub use error::{EmbedError, Result};
pub use handle::{EngineHandle, EngineSender, EngineStats};
pub use rules::{CompiledRule, Embed, EmbedDelivery, RuleSet};
pub use scanner::{EmbedRecord, PROCESSED_MARKER, ScanReport, Scanner};
pub use settings::{
    FsStore, MemoryStore, Message, Notifier, Rule, RuleBook, Settings, SettingsStore, Theme,
};
