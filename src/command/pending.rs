//! Collecting the log-derived answer to one command

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::trace;

use crate::event::{Event, EventType};
use crate::listener::EventHandler;

/// The single outstanding command of a channel.
///
/// Collection starts with the first event of the expected type and ends on
/// the first later event of any other type. Events seen before the response
/// starts are ignored.
#[derive(Debug)]
pub struct PendingCommand {
    pub expected: EventType,
    pub collected: Vec<Event>,
    started: Option<oneshot::Sender<()>>,
    finished: Option<oneshot::Sender<()>>,
}

/// Receivers for the two stages of a response
pub struct ResponseSignals {
    pub started: oneshot::Receiver<()>,
    pub finished: oneshot::Receiver<()>,
}

impl PendingCommand {
    pub fn new(expected: EventType) -> (Self, ResponseSignals) {
        let (started_tx, started) = oneshot::channel();
        let (finished_tx, finished) = oneshot::channel();
        let pending = Self {
            expected,
            collected: Vec::new(),
            started: Some(started_tx),
            finished: Some(finished_tx),
        };
        (pending, ResponseSignals { started, finished })
    }

    pub fn is_started(&self) -> bool {
        !self.collected.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_none()
    }

    /// Feed one event. Returns true once the response is complete.
    pub fn offer(&mut self, event: &Event) -> bool {
        if self.is_finished() {
            return true;
        }
        if event.kind == self.expected {
            self.collected.push(event.clone());
            if let Some(started) = self.started.take() {
                let _ = started.send(());
            }
            return false;
        }
        if self.is_started() {
            if let Some(finished) = self.finished.take() {
                let _ = finished.send(());
            }
            return true;
        }
        false
    }
}

pub(crate) type PendingSlot = Arc<Mutex<Option<PendingCommand>>>;

/// Handler feeding every event of a command listener to the pending command,
/// if there is one. Installed as that listener's fallback.
#[derive(Clone)]
pub struct Correlator {
    slot: PendingSlot,
}

impl Correlator {
    pub(crate) fn new(slot: PendingSlot) -> Self {
        Self { slot }
    }
}

#[async_trait]
impl EventHandler for Correlator {
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        let mut slot = self.slot.lock().await;
        match slot.as_mut() {
            Some(pending) => {
                pending.offer(event);
            }
            None => trace!("No pending command, ignoring {}", event.kind),
        }
        Ok(())
    }
}
