//! Common test utilities and helpers

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;

/// Temporary directory holding a stack file and the servers' log dirs
pub struct StackFixture {
    pub dir: TempDir,
}

impl StackFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `stack.toml`; `{root}` is replaced with the fixture directory.
    pub fn write_config(&self, template: &str) -> PathBuf {
        let path = self.path().join("stack.toml");
        let content = template.replace("{root}", &self.path().display().to_string());
        std::fs::write(&path, content).expect("write stack.toml");
        path
    }
}

pub fn append_log(path: &Path, text: &str) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("open log");
    file.write_all(text.as_bytes()).expect("append log");
}

/// Poll `check` every 10ms for up to three seconds.
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// A stand-in game server: reads commands from `stdin` and appends the
/// scripted console output for each one to `log`.
pub fn fake_zserv<R>(stdin: R, log: PathBuf, replies: HashMap<&'static str, &'static str>) -> JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut received = Vec::new();
        let mut lines = BufReader::new(stdin).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(reply) = replies.get(line.as_str()) {
                append_log(&log, reply);
            }
            received.push(line);
        }
        received
    })
}
