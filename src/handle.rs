//! Handles for feeding page changes and settings updates to a running engine.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::dom::{Mutation, Page};
use crate::error::{EmbedError, Result};
use crate::settings::Message;
use crate::worker::Event;

/// Counters reported by [`EngineHandle::stats`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Scans run, including the initial one.
    pub scans: usize,
    /// Embeds inserted over the engine's lifetime.
    pub embeds: usize,
    /// Rules in the current compiled set.
    pub active_rules: usize,
}

/// Primary handle returned by [`EngineBuilder::start`](crate::EngineBuilder::start).
///
/// Owns the shutdown signal and the engine task. Use [`mutate`](Self::mutate)
/// to report host changes and [`shutdown`](Self::shutdown) to stop the engine
/// and take back the page.
///
/// For sharing across tasks (for example with a [`RuleBook`](crate::RuleBook)),
/// obtain a cloneable [`EngineSender`] via [`sender`](Self::sender).
pub struct EngineHandle {
    sender: EngineSender,
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<Page>>,
}

impl EngineHandle {
    pub(crate) fn new(
        sender: mpsc::Sender<Event>,
        shutdown: oneshot::Sender<()>,
        worker: JoinHandle<Page>,
    ) -> Self {
        Self {
            sender: EngineSender { sender },
            shutdown: Some(shutdown),
            worker: Some(worker),
        }
    }

    /// Queue host mutations. They are applied together with anything else
    /// already queued, followed by at most one scan.
    ///
    /// Returns [`EmbedError::ChannelClosed`] if the queue is full or the
    /// engine has stopped.
    pub fn mutate(&self, mutations: Vec<Mutation>) -> Result<()> {
        self.sender.mutate(mutations)
    }

    /// Deliver a cross-context message such as `SETTINGS_UPDATED`.
    pub fn notify(&self, message: Message) -> Result<()> {
        self.sender.notify(message)
    }

    /// Create a lightweight, cloneable [`EngineSender`] on the same queue.
    pub fn sender(&self) -> EngineSender {
        self.sender.clone()
    }

    /// Serialized HTML of the page once everything queued so far is applied.
    pub async fn snapshot(&self) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        self.sender.send(Event::Snapshot(tx))?;
        rx.await.map_err(|_| EmbedError::ChannelClosed)
    }

    /// Engine counters once everything queued so far is applied.
    pub async fn stats(&self) -> Result<EngineStats> {
        let (tx, rx) = oneshot::channel();
        self.sender.send(Event::Stats(tx))?;
        rx.await.map_err(|_| EmbedError::ChannelClosed)
    }

    /// Stop the engine.
    ///
    /// Queued events are still applied before the task exits. Returns the
    /// page in its final state.
    pub async fn shutdown(mut self) -> Result<Page> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.worker.take() {
            Some(worker) => worker.await.map_err(|e| EmbedError::Engine(e.to_string())),
            None => Err(EmbedError::Engine("engine already stopped".into())),
        }
    }
}

/// Lightweight, cloneable sender into a running engine.
///
/// Does **not** own the shutdown signal or the task -- dropping every
/// sender leaves the engine running until its handle shuts it down.
#[derive(Clone)]
pub struct EngineSender {
    sender: mpsc::Sender<Event>,
}

impl EngineSender {
    /// Queue host mutations.
    pub fn mutate(&self, mutations: Vec<Mutation>) -> Result<()> {
        self.send(Event::Mutations(mutations))
    }

    /// Deliver a cross-context message.
    pub fn notify(&self, message: Message) -> Result<()> {
        self.send(Event::Message(message))
    }

    /// Deliver a message, logging the error via `tracing` on failure
    /// instead of returning it.
    pub fn notify_or_log(&self, message: Message) {
        if let Err(e) = self.notify(message) {
            tracing::error!("Failed to queue engine message: {e}");
        }
    }

    /// Whether the engine behind this sender has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn send(&self, event: Event) -> Result<()> {
        self.sender
            .try_send(event)
            .map_err(|_| EmbedError::ChannelClosed)
    }
}
