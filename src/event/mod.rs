//! Typed records decoded from the game server's log
//!
//! An [`Event`] is immutable once built. Two events are equal when their type,
//! timestamp and fields match; the raw line and category do not take part in
//! equality. Ordering is only defined between events of the same type.

mod types;

pub use types::{EventCategory, EventType};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::{Result, StackError};

/// A single observation from a log line (or a synthetic one from the supervisor)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub category: EventCategory,
    pub fields: BTreeMap<String, String>,
    /// Ordered speaker candidates for chat lines; empty for everything else.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
    pub raw_line: String,
}

impl Event {
    pub fn new(timestamp: DateTime<Utc>, kind: EventType, raw_line: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind,
            category: kind.default_category(),
            fields: BTreeMap::new(),
            candidates: Vec::new(),
            raw_line: raw_line.into(),
        }
    }

    pub fn with_category(mut self, category: EventCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<String>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Synthetic `error` event wrapping a failure that happened while decoding.
    pub fn error(timestamp: DateTime<Utc>, message: impl Into<String>, trace: impl Into<String>) -> Self {
        let trace = trace.into();
        Event::new(timestamp, EventType::Error, trace.clone())
            .with_field("message", message)
            .with_field("trace", trace)
    }

    /// Synthetic `junk` event for a line no rule recognised.
    pub fn junk(timestamp: DateTime<Utc>, line: impl Into<String>) -> Self {
        Event::new(timestamp, EventType::Junk, line)
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Field lookup for handlers that cannot proceed without the value.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.field(key).ok_or_else(|| {
            StackError::Decode(format!("{} event is missing field '{}'", self.kind, key))
        })
    }

    pub fn is_chat(&self) -> bool {
        self.kind == EventType::Message && self.category == EventCategory::Chat
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.timestamp == other.timestamp && self.fields == other.fields
    }
}

impl PartialOrd for Event {
    /// Events of different types are unordered.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.kind != other.kind {
            return None;
        }
        Some(self.timestamp.cmp(&other.timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_equality_ignores_raw_line() {
        let a = Event::new(at(10), EventType::Frag, "line one").with_field("weapon", "bfg");
        let b = Event::new(at(10), EventType::Frag, "line two").with_field("weapon", "bfg");
        assert_eq!(a, b);

        let c = b.clone().with_field("weapon", "fist");
        assert_ne!(a, c);
    }

    #[test]
    fn test_ordering_only_within_type() {
        let early = Event::new(at(1), EventType::Frag, "");
        let late = Event::new(at(2), EventType::Frag, "");
        let other = Event::new(at(3), EventType::Death, "");

        assert!(early < late);
        assert_eq!(early.partial_cmp(&other), None);
    }

    #[test]
    fn test_require_reports_missing_field() {
        let event = Event::new(at(0), EventType::Connection, "> x has connected.");
        let err = event.require("player").unwrap_err();
        assert!(err.to_string().contains("player"));
    }

    #[test]
    fn test_error_event_carries_message_and_trace() {
        let event = Event::error(at(0), "bad number", "map99999999999: Oops");
        assert_eq!(event.kind, EventType::Error);
        assert_eq!(event.category, EventCategory::Error);
        assert_eq!(event.field("message"), Some("bad number"));
        assert_eq!(event.field("trace"), Some("map99999999999: Oops"));
    }
}
