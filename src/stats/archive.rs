//! Persistence for finished rounds

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::round::RoundSnapshot;

/// Receives every round worth remembering when it ends
#[async_trait]
pub trait RoundArchive: Send + Sync {
    async fn store(&self, round: &RoundSnapshot) -> Result<()>;
}

/// Appends each round as one JSON line
pub struct JsonLinesArchive {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every stored round, oldest first.
    pub async fn load(&self) -> Result<Vec<RoundSnapshot>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("Failed to read round archive"),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("Malformed round archive entry"))
            .collect()
    }
}

#[async_trait]
impl RoundArchive for JsonLinesArchive {
    async fn store(&self, round: &RoundSnapshot) -> Result<()> {
        let mut line = serde_json::to_string(round)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create archive directory")?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .context("Failed to open round archive")?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!("Archived round to {}", self.path.display());
        Ok(())
    }
}
