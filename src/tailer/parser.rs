//! Bytes to events: line buffering plus decoding

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::buffer::LineBuffer;
use crate::decoder::LineDecoder;
use crate::event::Event;

/// Time source stamped onto decoded events
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Incremental parser over one log stream
pub struct LogParser {
    buffer: LineBuffer,
    decoder: LineDecoder,
    clock: Clock,
}

impl LogParser {
    pub fn new(decoder: LineDecoder, clock: Clock) -> Self {
        Self {
            buffer: LineBuffer::new(),
            decoder,
            clock,
        }
    }

    /// Feed newly read bytes; returns the events for every line they complete,
    /// in file order. Blank lines produce nothing.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Event> {
        let lines = self.buffer.push(bytes);
        if lines.is_empty() {
            return Vec::new();
        }
        let timestamp = (self.clock)();
        self.decoder.decode_lines(
            lines.iter().map(String::as_str).filter(|line| !line.trim().is_empty()),
            timestamp,
        )
    }

    /// Forget any partial line (used on rotation and truncation).
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn pending_bytes(&self) -> usize {
        self.buffer.remainder().len()
    }
}
