//! Log tailing: turn a growing, rotating file into a stream of events
//!
//! A [`LogTailer`] owns at most one open handle at a time. Its worker sleeps
//! for the poll interval, opens the file if it has appeared, reads whatever
//! is new and pushes the decoded events, in file order, to every registered
//! listener. Swapping the path goes through the same lock as reading, so a
//! read never races a closed handle.

pub mod buffer;
pub mod parser;

pub use buffer::LineBuffer;
pub use parser::{system_clock, Clock, LogParser};

use std::fs::Metadata;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::decoder::LineDecoder;
use crate::error::Result;
use crate::event::Event;
use crate::listener::EventSender;

const READ_CHUNK: usize = 64 * 1024;

struct TailSource {
    path: Option<PathBuf>,
    file: Option<File>,
    position: u64,
    parser: LogParser,
    missing_reported: bool,
}

impl TailSource {
    /// Open `path`, resuming at `position` when the file still holds that
    /// many bytes.
    async fn open(&mut self) -> Result<bool> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        let mut file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if self.missing_reported {
                    trace!("Log file {} does not exist yet", path.display());
                } else {
                    warn!(
                        "Log file {} does not exist; waiting for the server to create it",
                        path.display()
                    );
                    self.missing_reported = true;
                }
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        self.missing_reported = false;

        let len = file.metadata().await?.len();
        if len < self.position {
            warn!(
                "Log file {} shrank to {} bytes while closed, reading from the start",
                path.display(),
                len
            );
            self.position = 0;
            self.parser.reset();
        }
        if self.position > 0 {
            file.seek(SeekFrom::Start(self.position)).await?;
        }
        info!("Opened log file {} at offset {}", path.display(), self.position);
        self.file = Some(file);
        Ok(true)
    }

    fn forget_file(&mut self) {
        self.file = None;
        self.position = 0;
        self.parser.reset();
    }

    /// Read everything appended since the last call and decode it.
    async fn read_new(&mut self) -> Result<Vec<Event>> {
        if self.file.is_none() && !self.open().await? {
            return Ok(Vec::new());
        }
        let Some(file) = self.file.as_mut() else {
            return Ok(Vec::new());
        };

        let handle = file.metadata().await?;
        if handle.len() < self.position {
            warn!(
                "Log file shrank from {} to {} bytes, reading from the start",
                self.position,
                handle.len()
            );
            file.seek(SeekFrom::Start(0)).await?;
            self.position = 0;
            self.parser.reset();
        }

        let mut bytes = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let n = file.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
            self.position += n as u64;
        }
        let events = if bytes.is_empty() {
            Vec::new()
        } else {
            self.parser.feed(&bytes)
        };

        // the old handle is drained; the next poll opens the new file
        if self.replaced(&handle).await {
            info!("Log file was replaced, reopening from the start");
            self.forget_file();
        }
        Ok(events)
    }

    /// True when `path` now names a different file than the open handle.
    async fn replaced(&self, handle: &Metadata) -> bool {
        let Some(path) = self.path.as_ref() else {
            return false;
        };
        match tokio::fs::metadata(path).await {
            Ok(on_disk) => !same_file(handle, &on_disk),
            // moved away and not recreated yet; keep reading the old handle
            Err(_) => false,
        }
    }
}

#[cfg(unix)]
fn same_file(a: &Metadata, b: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(_a: &Metadata, _b: &Metadata) -> bool {
    true
}

/// Polls one log file and fans decoded events out to listeners
#[derive(Clone)]
pub struct LogTailer {
    name: Arc<str>,
    source: Arc<Mutex<TailSource>>,
    listeners: Arc<RwLock<Vec<EventSender>>>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
}

impl LogTailer {
    pub fn new(name: impl Into<String>, decoder: LineDecoder, poll_interval: Duration) -> Self {
        Self::with_clock(name, decoder, poll_interval, system_clock())
    }

    pub fn with_clock(
        name: impl Into<String>,
        decoder: LineDecoder,
        poll_interval: Duration,
        clock: Clock,
    ) -> Self {
        Self {
            name: Arc::from(name.into()),
            source: Arc::new(Mutex::new(TailSource {
                path: None,
                file: None,
                position: 0,
                parser: LogParser::new(decoder, clock),
                missing_reported: false,
            })),
            listeners: Arc::new(RwLock::new(Vec::new())),
            poll_interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn add_listener(&self, listener: EventSender) {
        debug!("Tailer {} feeding listener {}", self.name, listener.name());
        self.listeners.write().await.push(listener);
    }

    pub async fn file_path(&self) -> Option<PathBuf> {
        self.source.lock().await.path.clone()
    }

    /// Point the tailer at a new file.
    ///
    /// Re-pointing at the path already followed changes nothing: the handle,
    /// offset and any partial line are kept, so a respawned process writing
    /// to the same file loses no lines. For a different path, whatever the
    /// old file gained since the last poll is published first, then its
    /// handle and partial line are dropped. With `seek_to_end` the new
    /// file's existing content is skipped; without it parsing starts at
    /// byte 0. A file that does not exist yet is opened by the poll loop
    /// once it appears, from the beginning.
    pub async fn set_file_path(&self, path: impl AsRef<Path>, seek_to_end: bool) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let mut source = self.source.lock().await;

        if source.path.as_deref() == Some(path.as_path()) {
            debug!(
                "Tailer {} already following {}, keeping offset {}",
                self.name,
                path.display(),
                source.position
            );
            return Ok(());
        }

        if source.file.is_some() {
            match source.read_new().await {
                Ok(events) => self.publish(&events).await,
                Err(e) => warn!("Tailer {} could not drain the previous log: {}", self.name, e),
            }
        }
        source.forget_file();
        source.missing_reported = false;
        source.path = Some(path.clone());

        if source.open().await? && seek_to_end {
            let offset = match source.file.as_mut() {
                Some(file) => file.seek(SeekFrom::End(0)).await?,
                None => 0,
            };
            source.position = offset;
        }
        info!(
            "Tailer {} now following {} (seek_to_end: {}, offset: {})",
            self.name,
            path.display(),
            seek_to_end,
            source.position
        );
        Ok(())
    }

    /// One iteration of the poll loop; returns how many events were pushed.
    ///
    /// Events are published under the source lock so a concurrent path swap
    /// cannot reorder lines of the old and new files.
    pub async fn poll_once(&self) -> Result<usize> {
        let mut source = self.source.lock().await;
        let events = match source.read_new().await {
            Ok(events) => events,
            Err(e) => {
                // reopen at the same offset on the next iteration
                source.file = None;
                return Err(e);
            }
        };
        self.publish(&events).await;
        Ok(events.len())
    }

    /// Push events to every listener without waiting on any of them.
    pub async fn publish(&self, events: &[Event]) {
        if events.is_empty() {
            return;
        }
        let listeners = self.listeners.read().await;
        for event in events {
            for listener in listeners.iter() {
                listener.send(event.clone());
            }
        }
        trace!("Tailer {} published {} events", self.name, events.len());
    }

    /// Start the poll worker. It runs until [`LogTailer::stop`] is called,
    /// noticing the request within one poll interval.
    pub fn spawn(&self) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let tailer = self.clone();
        tokio::spawn(async move {
            debug!("Tailer {} started", tailer.name);
            while tailer.running.load(Ordering::SeqCst) {
                tokio::time::sleep(tailer.poll_interval).await;
                if let Err(e) = tailer.poll_once().await {
                    warn!("Tailer {} failed to read log: {}", tailer.name, e);
                }
            }
            debug!("Tailer {} stopped", tailer.name);
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
