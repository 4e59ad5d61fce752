//! Watches the share of lines the decoder could not make sense of

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::event::{Event, EventType};
use crate::listener::{EventHandler, HandlerTable};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthReport {
    pub total: u64,
    pub junk: u64,
    pub errors: u64,
    /// Junk share over the most recent window of events
    pub junk_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sample {
    Decoded,
    Junk,
    Error,
}

struct HealthWindow {
    samples: VecDeque<Sample>,
    total: u64,
    junk: u64,
    errors: u64,
    alarmed: bool,
}

/// Read-only observer counting junk and error events.
///
/// Logs a warning once when the windowed junk ratio reaches the alarm
/// threshold and an info line when it falls back below.
#[derive(Clone)]
pub struct HealthMonitor {
    server: Arc<str>,
    window_size: usize,
    alarm_ratio: f64,
    inner: Arc<Mutex<HealthWindow>>,
}

impl HealthMonitor {
    pub fn new(server: impl Into<String>, window_size: usize, alarm_ratio: f64) -> Self {
        Self {
            server: Arc::from(server.into()),
            window_size: window_size.max(1),
            alarm_ratio,
            inner: Arc::new(Mutex::new(HealthWindow {
                samples: VecDeque::new(),
                total: 0,
                junk: 0,
                errors: 0,
                alarmed: false,
            })),
        }
    }

    pub fn table(&self) -> HandlerTable {
        HandlerTable::new().fallback(Arc::new(self.clone()))
    }

    pub async fn record(&self, kind: EventType) {
        let sample = match kind {
            EventType::Junk => Sample::Junk,
            EventType::Error => Sample::Error,
            EventType::ProcessExit => return,
            _ => Sample::Decoded,
        };

        let mut window = self.inner.lock().await;
        window.total += 1;
        match sample {
            Sample::Junk => window.junk += 1,
            Sample::Error => window.errors += 1,
            Sample::Decoded => {}
        }
        window.samples.push_back(sample);
        while window.samples.len() > self.window_size {
            window.samples.pop_front();
        }

        // wait for a quarter window before judging
        if window.samples.len() < self.window_size.div_ceil(4) {
            return;
        }
        let ratio = junk_ratio(&window.samples);
        if ratio >= self.alarm_ratio && !window.alarmed {
            window.alarmed = true;
            warn!(
                server = %self.server,
                "{:.0}% of the last {} log lines were not recognised",
                ratio * 100.0,
                window.samples.len()
            );
        } else if ratio < self.alarm_ratio && window.alarmed {
            window.alarmed = false;
            info!(server = %self.server, "Unrecognised line rate back to {:.0}%", ratio * 100.0);
        }
    }

    pub async fn report(&self) -> HealthReport {
        let window = self.inner.lock().await;
        HealthReport {
            total: window.total,
            junk: window.junk,
            errors: window.errors,
            junk_ratio: junk_ratio(&window.samples),
        }
    }

    pub async fn is_alarmed(&self) -> bool {
        self.inner.lock().await.alarmed
    }
}

fn junk_ratio(samples: &VecDeque<Sample>) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let junk = samples.iter().filter(|s| **s == Sample::Junk).count();
    junk as f64 / samples.len() as f64
}

#[async_trait]
impl EventHandler for HealthMonitor {
    async fn handle(&self, event: &Event) -> Result<()> {
        self.record(event.kind).await;
        Ok(())
    }
}
