//! Injects the engine into a desktop host over its remote debugging port.
//!
//! The runner keeps looking for a page target on the debugger, attaches to
//! it, turns off the page's content policy and reloads it, then evaluates
//! the storage shim and the engine scripts after every load or navigation.
//! A lost connection ends the session and discovery starts over.

pub mod cdp;
mod shim;

pub use cdp::{CdpEvent, CdpSession, Frame, Target, discover, parse_frame, pick_target};
pub use shim::{seed_settings, storage_shim};

use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::{EmbedError, Result};

/// A named script evaluated in the page after the storage shim.
#[derive(Clone, Debug)]
pub struct Script {
    pub name: String,
    pub source: String,
}

/// Settings for [`run`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use tana_tweaks::runner::{self, RunnerConfig};
///
/// # async fn example(engine_js: String) -> tana_tweaks::Result<()> {
/// let config = RunnerConfig::new()
///     .port(9223)
///     .retry_interval(Duration::from_secs(5))
///     .script("engine.js", engine_js);
/// runner::run(config).await
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    port: u16,
    target: String,
    retry: Duration,
    keepalive: Duration,
    load_delay: Duration,
    navigation_delay: Duration,
    storage_key: String,
    scripts: Vec<Script>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            port: 9222,
            target: "app.tana.inc".to_string(),
            retry: Duration::from_secs(2),
            keepalive: Duration::from_secs(5),
            load_delay: Duration::from_millis(500),
            navigation_delay: Duration::from_millis(1000),
            storage_key: "tana-tweaks-settings".to_string(),
            scripts: Vec::new(),
        }
    }
}

impl RunnerConfig {
    /// Defaults: port 9222, target `app.tana.inc`, retry every 2 s,
    /// keep-alive every 5 s, inject 500 ms after load and 1 s after navigation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote debugging port on localhost.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Substring a page URL must contain to be attached to.
    pub fn target(mut self, needle: impl Into<String>) -> Self {
        self.target = needle.into();
        self
    }

    /// Pause between discovery attempts and after a session ends.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry = interval;
        self
    }

    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive = interval;
        self
    }

    /// Delay between `Page.loadEventFired` and injection.
    pub fn load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Delay between a matching `Page.frameNavigated` and injection.
    pub fn navigation_delay(mut self, delay: Duration) -> Self {
        self.navigation_delay = delay;
        self
    }

    /// `localStorage` entry backing the storage shim.
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Append an engine script. Scripts run in the order added.
    pub fn script(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.scripts.push(Script {
            name: name.into(),
            source: source.into(),
        });
        self
    }

    pub fn scripts(&self) -> &[Script] {
        &self.scripts
    }
}

/// Discover, attach and inject, forever.
///
/// Only returns on a setup error; session failures are logged and retried.
pub async fn run(config: RunnerConfig) -> Result<()> {
    if config.scripts.is_empty() {
        return Err(EmbedError::Config("no engine scripts to inject".into()));
    }
    let shim = Script {
        name: "storage shim".to_string(),
        source: storage_shim(&config.storage_key, &seed_settings())?,
    };
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    tracing::info!("Watching localhost:{} for {}", config.port, config.target);
    loop {
        match discover(&client, config.port, &config.target).await {
            Ok(Some(target)) => match session(&config, &target, &shim).await {
                Ok(()) => tracing::info!("Disconnected"),
                Err(e) => tracing::warn!("Session ended: {e}"),
            },
            Ok(None) => tracing::info!("No page matching {} yet, waiting", config.target),
            Err(e) => tracing::debug!("Debugger not reachable: {e}"),
        }
        time::sleep(config.retry).await;
    }
}

async fn session(config: &RunnerConfig, target: &Target, shim: &Script) -> Result<()> {
    let url = target
        .web_socket_debugger_url
        .as_deref()
        .ok_or_else(|| EmbedError::Cdp(format!("{} has no debugger URL", target.url)))?;
    let mut session = CdpSession::connect(url).await?;

    session.call("Page.enable", json!({})).await?;
    session.call("Runtime.enable", json!({})).await?;
    // the bypass only applies to documents loaded after it is set
    session.call("Page.setBypassCSP", json!({ "enabled": true })).await?;
    session.call("Page.reload", json!({ "ignoreCache": true })).await?;
    tracing::info!("Content policy bypass enabled, page reloading");

    let mut keepalive = time::interval_at(Instant::now() + config.keepalive, config.keepalive);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut inject_at: Option<Instant> = None;

    loop {
        tokio::select! {
            event = session.next_event() => {
                let Some(event) = event? else {
                    return Ok(());
                };
                match event.method.as_str() {
                    "Page.loadEventFired" => {
                        tracing::info!("Page loaded, injecting shortly");
                        inject_at = Some(Instant::now() + config.load_delay);
                    }
                    "Page.frameNavigated" if navigated_to(&event.params, &config.target) => {
                        tracing::info!("Page navigated, re-enabling content policy bypass");
                        let bypass = session
                            .call("Page.setBypassCSP", json!({ "enabled": true }))
                            .await;
                        if let Err(e) = bypass {
                            tracing::debug!("Bypass not re-enabled: {e}");
                        }
                        inject_at = Some(Instant::now() + config.navigation_delay);
                    }
                    _ => {}
                }
            }

            _ = keepalive.tick() => {
                session.call("Runtime.evaluate", json!({ "expression": "1" })).await?;
            }

            _ = time::sleep_until(inject_at.unwrap_or_else(Instant::now)),
                if inject_at.is_some() =>
            {
                inject_at = None;
                if let Err(e) = inject(&mut session, shim, &config.scripts).await {
                    tracing::warn!("Injection failed: {e}");
                }
            }
        }
    }
}

fn navigated_to(params: &Value, needle: &str) -> bool {
    params
        .pointer("/frame/url")
        .and_then(Value::as_str)
        .is_some_and(|url| url.contains(needle))
}

async fn inject(session: &mut CdpSession, shim: &Script, scripts: &[Script]) -> Result<()> {
    for script in std::iter::once(shim).chain(scripts) {
        let result = session
            .call("Runtime.evaluate", json!({ "expression": script.source }))
            .await?;
        match result.get("exceptionDetails") {
            Some(details) => tracing::warn!("{} threw: {details}", script.name),
            None => tracing::info!("Injected {}", script.name),
        }
    }
    Ok(())
}
