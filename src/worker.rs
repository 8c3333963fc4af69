//! The engine task: owns the page and serializes every scan.
//!
//! This module is internal -- users interact with it indirectly through
//! [`EngineHandle`](crate::EngineHandle).

use tokio::sync::{mpsc, oneshot};

use crate::dom::{Mutation, Page};
use crate::handle::EngineStats;
use crate::rules::RuleSet;
use crate::scanner::Scanner;
use crate::settings::{Message, Settings};

/// Work queued for the engine task.
pub(crate) enum Event {
    Mutations(Vec<Mutation>),
    Message(Message),
    Snapshot(oneshot::Sender<String>),
    Stats(oneshot::Sender<EngineStats>),
}

/// One step of a batch. Steps keep the order events arrived in.
enum Step {
    Mutations(Vec<Mutation>),
    Settings(Settings),
}

/// Everything received in one wake-up of the task.
#[derive(Default)]
struct Batch {
    steps: Vec<Step>,
    snapshots: Vec<oneshot::Sender<String>>,
    stats: Vec<oneshot::Sender<EngineStats>>,
}

impl Batch {
    fn push(&mut self, event: Event) {
        match event {
            Event::Mutations(mutations) => match self.steps.last_mut() {
                Some(Step::Mutations(pending)) => pending.extend(mutations),
                _ => self.steps.push(Step::Mutations(mutations)),
            },
            Event::Message(Message::SettingsUpdated { settings }) => match self.steps.last_mut() {
                // back-to-back updates: only the later one is compiled
                Some(Step::Settings(pending)) => *pending = settings,
                _ => self.steps.push(Step::Settings(settings)),
            },
            Event::Snapshot(reply) => self.snapshots.push(reply),
            Event::Stats(reply) => self.stats.push(reply),
        }
    }
}

pub(crate) async fn run(
    mut rx: mpsc::Receiver<Event>,
    mut shutdown_rx: oneshot::Receiver<()>,
    mut page: Page,
    mut scanner: Scanner,
    mut stats: EngineStats,
) -> Page {
    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_rx => {
                tracing::info!("Shutdown signal received, draining queue");
                rx.close();
                let mut batch = Batch::default();
                while let Some(event) = rx.recv().await {
                    batch.push(event);
                }
                process(batch, &mut page, &mut scanner, &mut stats);
                tracing::info!("Engine shut down");
                return page;
            }

            event = rx.recv() => {
                let Some(event) = event else {
                    tracing::debug!("All senders dropped, engine idle until shutdown");
                    let _ = (&mut shutdown_rx).await;
                    return page;
                };
                let mut batch = Batch::default();
                batch.push(event);
                while let Ok(event) = rx.try_recv() {
                    batch.push(event);
                }
                process(batch, &mut page, &mut scanner, &mut stats);
            }
        }
    }
}

/// Apply a batch in arrival order.
///
/// Mutations queued ahead of a settings update are scanned under the rules
/// that were active when they arrived; the update then triggers its own
/// scan. Consecutive mutations share one scan.
fn process(batch: Batch, page: &mut Page, scanner: &mut Scanner, stats: &mut EngineStats) {
    let mut needs_scan = false;

    for step in batch.steps {
        match step {
            Step::Mutations(mutations) => {
                for mutation in &mutations {
                    match page.apply(mutation) {
                        Ok(added) => needs_scan |= added,
                        Err(e) => tracing::warn!("Skipping host mutation: {e}"),
                    }
                }
            }
            Step::Settings(settings) => {
                match RuleSet::compile(&settings.custom_rules, scanner.marker()) {
                    Ok(rules) => {
                        if needs_scan {
                            scan(page, scanner, stats);
                        }
                        tracing::info!("Settings updated ({} rules enabled)", rules.len());
                        scanner.replace_rules(rules);
                        needs_scan = true;
                    }
                    Err(e) => tracing::error!("Keeping previous rules, update rejected: {e}"),
                }
            }
        }
    }

    if needs_scan {
        scan(page, scanner, stats);
    }
    stats.active_rules = scanner.rules().len();

    for reply in batch.snapshots {
        let _ = reply.send(page.html());
    }
    for reply in batch.stats {
        let _ = reply.send(stats.clone());
    }
}

fn scan(page: &mut Page, scanner: &Scanner, stats: &mut EngineStats) {
    let report = scanner.scan(page);
    stats.scans += 1;
    stats.embeds += report.embeds.len();
}
