//! The binary's commands

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::config::AppConfig;
use crate::app::signals::shutdown_signal;
use crate::config::{self, ServerConfig};
use crate::decoder::LineDecoder;
use crate::stack::Stack;
use crate::supervisor::TokioSpawner;
use crate::tailer::{system_clock, LogParser};

/// Load and validate the stack file.
pub async fn check_config(app: &AppConfig) -> Result<Vec<ServerConfig>> {
    let stack = config::load(app.config_path.as_deref())
        .await
        .context("loading stack configuration")?;
    let servers = stack.resolve().context("validating stack configuration")?;
    Ok(servers)
}

/// Start the selected servers and supervise them until SIGINT or SIGTERM.
pub async fn run_stack(app: &AppConfig, names: &[String]) -> Result<()> {
    let servers = check_config(app).await?;
    let stack = Stack::from_servers(servers, Arc::new(TokioSpawner))
        .await
        .context("building servers")?;
    let mut signal = shutdown_signal().context("installing signal handlers")?;

    if let Err(e) = stack.start(names).await {
        stack.shutdown().await.ok();
        return Err(e).context("starting servers");
    }
    info!("Supervising {}", stack.names().join(", "));

    signal.recv().await;
    info!("Shutting down, signal again to exit immediately");
    tokio::select! {
        result = stack.shutdown() => result.context("shutting down")?,
        _ = signal.recv_next() => {
            warn!("Second signal, exiting without waiting for servers");
            std::process::exit(130);
        }
    }
    Ok(())
}

/// Decode a log file and write its events as JSON lines; returns the count.
pub async fn decode_file(path: &Path, out: &mut impl Write) -> Result<usize> {
    let mut bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    if bytes.last().is_some_and(|b| *b != b'\n') {
        bytes.push(b'\n');
    }

    let mut parser = LogParser::new(LineDecoder::default(), system_clock());
    let events = parser.feed(&bytes);
    for event in &events {
        serde_json::to_writer(&mut *out, event)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(events.len())
}
