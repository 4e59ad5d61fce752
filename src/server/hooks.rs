//! Lifecycle hooks tying the supervisor to the log pipeline

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::rotation::todays_log_path;
use crate::event::{Event, EventType};
use crate::listener::EventSender;
use crate::supervisor::{ExitInfo, LifecycleHook, SpawnInfo};
use crate::tailer::LogTailer;

/// Opens today's log before the process that writes it exists.
///
/// The first spawn parses the existing file from the start when
/// `replay_existing_log` is set, and skips what is already there otherwise.
/// A respawn on the same day keeps reading where the tailer left off.
pub struct OpenLogHook {
    pub tailer: LogTailer,
    pub log_dir: PathBuf,
    pub pattern: String,
    pub replay_existing_log: bool,
}

#[async_trait]
impl LifecycleHook for OpenLogHook {
    async fn pre_spawn(&self, info: &SpawnInfo) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.log_dir)
            .await
            .with_context(|| format!("creating log directory {}", self.log_dir.display()))?;
        let path = todays_log_path(&self.log_dir, &self.pattern)?;
        let seek_to_end = !(info.attempt == 1 && self.replay_existing_log);
        self.tailer
            .set_file_path(&path, seek_to_end)
            .await
            .with_context(|| format!("opening log {}", path.display()))?;
        Ok(())
    }
}

/// Tells the game-state listener the process is gone.
pub struct ExitEventHook {
    pub stats: EventSender,
}

#[async_trait]
impl LifecycleHook for ExitEventHook {
    async fn post_exit(&self, info: &ExitInfo) -> anyhow::Result<()> {
        let mut event = Event::new(Utc::now(), EventType::ProcessExit, "");
        if let Some(code) = info.status.code() {
            event = event.with_field("exit_code", code.to_string());
        }
        if let Some(pid) = info.pid {
            event = event.with_field("pid", pid.to_string());
        }
        if !self.stats.send(event) {
            warn!("Game-state listener is gone, process exit not recorded");
        } else {
            debug!("Queued process_exit for {}", self.stats.name());
        }
        Ok(())
    }
}
