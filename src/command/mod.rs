//! Request/response over two unrelated channels
//!
//! A command goes out on the process's stdin; its answer, if any, shows up
//! later as a contiguous run of same-typed log lines. [`CommandChannel`]
//! serializes commands, registers what it expects before writing, and waits
//! in two bounded stages for the run to start and then to end. Its
//! [`Correlator`] must be the fallback handler of a listener fed by the same
//! log source.

pub mod commands;
pub mod pending;
pub mod sink;

pub use commands::{
    validate_command, BanRecord, MapRecord, PlayerRecord, ResponseRecord, ServerCommand, Variable,
    WadRecord,
};
pub use pending::{Correlator, PendingCommand, ResponseSignals};
pub use sink::{BoxedWriter, CommandSink, StdinSink};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::error::{Result, StackError, TimeoutStage};
use crate::event::{Event, EventType};
use pending::PendingSlot;

/// What a command produced
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResponse {
    /// Written; no response was asked for.
    Sent,
    /// Written, but the server's logging is off so no echo can be observed.
    NoResponse,
    /// The collected response run, in log order.
    Events(Vec<Event>),
}

impl CommandResponse {
    pub fn events(&self) -> &[Event] {
        match self {
            CommandResponse::Events(events) => events,
            _ => &[],
        }
    }

    pub fn into_events(self) -> Vec<Event> {
        match self {
            CommandResponse::Events(events) => events,
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseTimeouts {
    pub start: Duration,
    pub finish: Duration,
}

impl Default for ResponseTimeouts {
    fn default() -> Self {
        Self {
            start: Duration::from_secs(2),
            finish: Duration::from_secs(1),
        }
    }
}

pub struct CommandChannel {
    name: Arc<str>,
    sink: Arc<dyn CommandSink>,
    slot: PendingSlot,
    command_lock: Mutex<()>,
    logging_enabled: AtomicBool,
    timeouts: ResponseTimeouts,
}

impl CommandChannel {
    pub fn new(name: impl Into<String>, sink: Arc<dyn CommandSink>, timeouts: ResponseTimeouts) -> Self {
        Self {
            name: Arc::from(name.into()),
            sink,
            slot: Arc::new(Mutex::new(None)),
            command_lock: Mutex::new(()),
            logging_enabled: AtomicBool::new(true),
            timeouts,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handler to install as the fallback of this channel's listener.
    pub fn correlator(&self) -> Correlator {
        Correlator::new(Arc::clone(&self.slot))
    }

    pub fn set_logging_enabled(&self, enabled: bool) {
        self.logging_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging_enabled.load(Ordering::SeqCst)
    }

    pub fn timeouts(&self) -> ResponseTimeouts {
        self.timeouts
    }

    /// Write `line` and, when `expect` is given, wait for its response run.
    pub async fn send(&self, line: &str, expect: Option<EventType>) -> Result<CommandResponse> {
        validate_command(line)?;
        let _guard = self.command_lock.lock().await;

        let Some(expected) = expect else {
            self.sink.send_line(line).await?;
            debug!(server = %self.name, "Sent {:?}", line);
            return Ok(CommandResponse::Sent);
        };
        if !self.logging_enabled() {
            self.sink.send_line(line).await?;
            debug!(server = %self.name, "Sent {:?} with logging disabled", line);
            return Ok(CommandResponse::NoResponse);
        }

        let (pending, signals) = PendingCommand::new(expected);
        *self.slot.lock().await = Some(pending);

        if let Err(e) = self.sink.send_line(line).await {
            self.slot.lock().await.take();
            return Err(e);
        }
        debug!(server = %self.name, "Sent {:?}, expecting {}", line, expected);

        self.wait_stage(line, signals.started, TimeoutStage::Start, self.timeouts.start)
            .await?;
        self.wait_stage(line, signals.finished, TimeoutStage::Finish, self.timeouts.finish)
            .await?;

        let collected = self
            .slot
            .lock()
            .await
            .take()
            .map(|pending| pending.collected)
            .unwrap_or_default();
        debug!(server = %self.name, "{:?} answered with {} events", line, collected.len());
        Ok(CommandResponse::Events(collected))
    }

    async fn wait_stage(
        &self,
        line: &str,
        signal: oneshot::Receiver<()>,
        stage: TimeoutStage,
        waited: Duration,
    ) -> Result<()> {
        match tokio::time::timeout(waited, signal).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => {
                self.slot.lock().await.take();
                Err(StackError::Channel(format!(
                    "response tracking for {line:?} was dropped"
                )))
            }
            Err(_) => {
                // late events of this response are discarded from here on
                let collected = self
                    .slot
                    .lock()
                    .await
                    .take()
                    .map(|pending| pending.collected.len())
                    .unwrap_or_default();
                warn!(
                    server = %self.name,
                    "Command {:?} timed out waiting for response {} ({} events collected)",
                    line, stage, collected
                );
                Err(StackError::CommandTimeout {
                    command: line.to_string(),
                    stage,
                    waited,
                    collected,
                })
            }
        }
    }

    pub async fn execute(&self, command: &ServerCommand) -> Result<CommandResponse> {
        self.send(&command.to_line(), command.expected_response()).await
    }

    /// Run a command and decode its response into records.
    /// With logging disabled the result is empty.
    pub async fn query<R: ResponseRecord>(&self, command: &ServerCommand) -> Result<Vec<R>> {
        let response = self.send(&command.to_line(), Some(R::KIND)).await?;
        R::from_events(response.events())
    }

    pub async fn players(&self) -> Result<Vec<PlayerRecord>> {
        self.query(&ServerCommand::Players).await
    }

    pub async fn get(&self, variable: &str) -> Result<Option<Variable>> {
        let vars: Vec<Variable> = self
            .query(&ServerCommand::Get {
                variable: variable.to_string(),
            })
            .await?;
        Ok(vars.into_iter().next())
    }
}

#[cfg(test)]
mod tests;
