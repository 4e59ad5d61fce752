//! Event listeners: one FIFO queue and one worker each
//!
//! The tailer pushes events without ever blocking; each listener's worker
//! drains its queue in arrival order and hands every event to the handler
//! registered for its type. A failing or panicking handler is logged and the
//! worker moves on to the next event.

mod handler;

pub use handler::{EventHandler, FnHandler, HandlerTable, NoopHandler};

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::event::Event;

/// Producer side of a listener's queue
#[derive(Clone)]
pub struct EventSender {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<Event>,
    counters: Arc<ListenerCounters>,
}

impl EventSender {
    /// Enqueue without blocking. Returns false once the listener is gone.
    pub fn send(&self, event: Event) -> bool {
        match self.tx.send(event) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::SeqCst);
                true
            }
            Err(_) => {
                trace!("Listener {} is closed, dropping event", self.name);
                false
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Default)]
struct ListenerCounters {
    queued: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of a listener's throughput counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ListenerStats {
    pub queued: u64,
    pub processed: u64,
    pub failed: u64,
}

/// A queue plus the worker draining it
pub struct EventListener {
    name: Arc<str>,
    sender: EventSender,
    counters: Arc<ListenerCounters>,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl EventListener {
    /// Create the queue and start the worker on the current runtime.
    pub fn spawn(name: impl Into<String>, table: HandlerTable) -> Self {
        let name: Arc<str> = Arc::from(name.into());
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(ListenerCounters::default());
        let running = Arc::new(AtomicBool::new(true));
        let wake = Arc::new(Notify::new());

        let handle = tokio::spawn(run_worker(
            Arc::clone(&name),
            table,
            rx,
            Arc::clone(&counters),
            Arc::clone(&running),
            Arc::clone(&wake),
        ));

        let sender = EventSender {
            name: Arc::clone(&name),
            tx,
            counters: Arc::clone(&counters),
        };

        Self {
            name,
            sender,
            counters,
            running,
            wake,
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    pub fn stats(&self) -> ListenerStats {
        ListenerStats {
            queued: self.counters.queued.load(Ordering::SeqCst),
            processed: self.counters.processed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }

    /// Wait until every queued event has been handled, or `timeout` passes.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let stats = self.stats();
            if stats.processed >= stats.queued {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    /// Ask the worker to exit; it notices before taking the next event.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub async fn join(self) {
        self.stop();
        if let Err(e) = self.handle.await {
            warn!("Listener {} worker ended abnormally: {}", self.name, e);
        }
    }
}

async fn run_worker(
    name: Arc<str>,
    table: HandlerTable,
    mut rx: mpsc::UnboundedReceiver<Event>,
    counters: Arc<ListenerCounters>,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
) {
    debug!("Listener {} started", name);
    while running.load(Ordering::SeqCst) {
        let event = tokio::select! {
            biased;
            _ = wake.notified() => continue,
            event = rx.recv() => event,
        };
        let Some(event) = event else {
            break;
        };

        if !dispatch(&name, &table, &event).await {
            counters.failed.fetch_add(1, Ordering::SeqCst);
        }
        counters.processed.fetch_add(1, Ordering::SeqCst);
    }
    debug!("Listener {} stopped", name);
}

/// Run the handler for one event, containing errors and panics.
async fn dispatch(name: &str, table: &HandlerTable, event: &Event) -> bool {
    let handler = table.handler_for(event.kind);
    match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(
                listener = name,
                event_type = %event.kind,
                "Handler failed for line {:?}: {:#}",
                event.raw_line,
                e
            );
            false
        }
        Err(_) => {
            error!(
                listener = name,
                event_type = %event.kind,
                "Handler panicked on line {:?}",
                event.raw_line
            );
            false
        }
    }
}
