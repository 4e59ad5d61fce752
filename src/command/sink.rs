//! Where command lines are written

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, StackError};

/// Destination for command lines. The line is given without a terminator.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn send_line(&self, line: &str) -> Result<()>;
}

pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Writes to the supervised process's stdin.
///
/// The supervisor attaches the pipe after every spawn and detaches it when
/// the process exits, so one sink serves every incarnation of the process.
#[derive(Clone)]
pub struct StdinSink {
    name: Arc<str>,
    slot: Arc<Mutex<Option<BoxedWriter>>>,
}

impl StdinSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn attach(&self, writer: BoxedWriter) {
        debug!("Attached stdin of {}", self.name);
        *self.slot.lock().await = Some(writer);
    }

    pub async fn detach(&self) {
        if self.slot.lock().await.take().is_some() {
            debug!("Detached stdin of {}", self.name);
        }
    }

    pub async fn is_attached(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

#[async_trait]
impl CommandSink for StdinSink {
    async fn send_line(&self, line: &str) -> Result<()> {
        let mut slot = self.slot.lock().await;
        let writer = slot
            .as_mut()
            .ok_or_else(|| StackError::ProcessNotRunning(self.name.to_string()))?;

        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        let written = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            warn!("Writing to stdin of {} failed: {}", self.name, e);
            *slot = None;
            return Err(e.into());
        }
        Ok(())
    }
}
