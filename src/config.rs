//! Builder for configuring and starting the embed engine on a page.

use crate::dom::{HostLayout, Page};
use crate::error::{EmbedError, Result};
use crate::handle::{EngineHandle, EngineStats};
use crate::rules::{EmbedDelivery, RuleSet};
use crate::scanner::{PROCESSED_MARKER, Scanner};
use crate::settings::{self, SettingsStore};
use crate::worker::{self, Event};

/// Builder for configuring and starting an [`EngineHandle`].
///
/// # Example
///
/// ```rust,no_run
/// use tana_tweaks::{EmbedDelivery, EngineBuilder, FsStore, Mutation, Page};
///
/// # async fn example() -> tana_tweaks::Result<()> {
/// let page = Page::at("https://app.tana.inc/", "<div id=\"root\"></div>")?;
/// let engine = EngineBuilder::new(FsStore::new("/tmp/tana-tweaks.json"), page)
///     .delivery(EmbedDelivery::DirectUrl)
///     .channel_buffer(64)
///     .start()
///     .await?;
///
/// engine.mutate(vec![Mutation::Append {
///     parent: "#root".into(),
///     html: r#"<a href="https://www.loom.com/share/abc">demo</a>"#.into(),
/// }])?;
///
/// let page = engine.shutdown().await?;
/// println!("{}", page.html());
/// # Ok(())
/// # }
/// ```
pub struct EngineBuilder<S: SettingsStore> {
    store: S,
    page: Page,
    delivery: EmbedDelivery,
    layout: HostLayout,
    marker: String,
    channel_buffer: usize,
}

impl<S: SettingsStore> EngineBuilder<S> {
    /// Create a builder for `page`, reading settings from `store`.
    ///
    /// Defaults: fragment delivery, the stock host layout, the
    /// `data-tana-tweaks-processed` marker, channel buffer 256.
    pub fn new(store: S, page: Page) -> Self {
        Self {
            store,
            page,
            delivery: EmbedDelivery::default(),
            layout: HostLayout::default(),
            marker: PROCESSED_MARKER.to_string(),
            channel_buffer: 256,
        }
    }

    /// How expanded templates are turned into embeds.
    pub fn delivery(mut self, delivery: EmbedDelivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Wrapper and editable-region selectors of the host page.
    pub fn layout(mut self, layout: HostLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Attribute used to mark handled anchors.
    pub fn processed_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Capacity of the queue between the handle and the engine task.
    pub fn channel_buffer(mut self, size: usize) -> Self {
        self.channel_buffer = size;
        self
    }

    /// Read settings, run the initial scan and spawn the engine task.
    ///
    /// Failing to read settings is fatal: no scan runs and no task is spawned.
    pub async fn start(self) -> Result<EngineHandle> {
        if self.channel_buffer == 0 {
            return Err(EmbedError::Config("channel buffer must be non-zero".into()));
        }

        let settings = settings::read(&self.store).await.inspect_err(|e| {
            tracing::error!("Failed to load settings: {e}");
        })?;
        let rules = RuleSet::compile(&settings.custom_rules, &self.marker)?;
        tracing::info!("Engine active ({} rules enabled)", rules.len());

        let scanner = Scanner::new(rules, self.delivery, self.layout, self.marker);
        let mut page = self.page;
        let report = scanner.scan(&mut page);
        let stats = EngineStats {
            scans: 1,
            embeds: report.embeds.len(),
            active_rules: scanner.rules().len(),
        };

        let (tx, rx) = tokio::sync::mpsc::channel::<Event>(self.channel_buffer);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let worker = tokio::spawn(worker::run(rx, shutdown_rx, page, scanner, stats));

        Ok(EngineHandle::new(tx, shutdown_tx, worker))
    }
}
