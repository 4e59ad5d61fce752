//! Daily log files
//!
//! The game server names its log after the local date. A per-server task
//! recomputes today's name on a timer and moves the tailer over when it
//! changes.

use chrono::{DateTime, Local, TimeZone};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, StackError};
use crate::tailer::LogTailer;

/// Render `pattern` (chrono strftime) for `now` under `dir`.
pub fn log_path_for<Tz>(dir: &Path, pattern: &str, now: &DateTime<Tz>) -> Result<PathBuf>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut name = String::new();
    write!(name, "{}", now.format(pattern))
        .map_err(|_| StackError::Config(format!("invalid log_file_pattern '{pattern}'")))?;
    Ok(dir.join(name))
}

pub fn todays_log_path(dir: &Path, pattern: &str) -> Result<PathBuf> {
    log_path_for(dir, pattern, &Local::now())
}

/// Watches the date and re-points `tailer` at each new day's file.
pub struct RotationTask {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl RotationTask {
    pub fn spawn(tailer: LogTailer, dir: PathBuf, pattern: String, interval: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = tokio::spawn(async move {
            while flag.load(Ordering::SeqCst) {
                tokio::time::sleep(interval).await;
                if let Err(e) = rotate_if_needed(&tailer, &dir, &pattern).await {
                    warn!("Log rotation check for {} failed: {}", tailer.name(), e);
                }
            }
            debug!("Rotation task for {} stopped", tailer.name());
        });
        Self { running, handle }
    }

    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        self.handle.abort();
    }
}

/// Returns true when the tailer was moved to a new file.
pub async fn rotate_if_needed(tailer: &LogTailer, dir: &Path, pattern: &str) -> Result<bool> {
    // nothing to rotate before the first spawn picked a file
    let Some(current) = tailer.file_path().await else {
        return Ok(false);
    };
    let today = todays_log_path(dir, pattern)?;
    if today == current {
        return Ok(false);
    }
    info!(
        "Log for {} rotated from {} to {}",
        tailer.name(),
        current.display(),
        today.display()
    );
    tailer.set_file_path(&today, true).await?;
    Ok(true)
}
