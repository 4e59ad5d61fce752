//! Line decoder: one complete log line in, one event out
//!
//! Lines are matched against an ordered table of [`Rule`]s; the first match
//! wins. Unmatched lines become `junk` events so their rate can be watched.

pub mod chat;
pub mod rules;

pub use chat::{resolve_speaker, speaker_candidates, ResolvedChat};
pub use rules::{Rule, RuleAction, DEFAULT_RULES};

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::{Result, StackError};
use crate::event::{Event, EventType};

/// Maps raw lines to events using an ordered rule table
#[derive(Clone)]
pub struct LineDecoder {
    rules: Arc<Vec<Rule>>,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    /// Decoder using the built-in zserv rule table
    pub fn new() -> Self {
        Self {
            rules: Arc::new(DEFAULT_RULES.clone()),
        }
    }

    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Decode a single line (without its terminator).
    ///
    /// Returns an error only when a rule matched but a capture it declares
    /// numeric does not fit; callers turn that into an `error` event.
    pub fn decode(&self, line: &str, timestamp: DateTime<Utc>) -> Result<Event> {
        for rule in self.rules.iter() {
            let Some(captures) = rule.pattern.captures(line) else {
                continue;
            };

            let mut event = Event::new(timestamp, rule.kind, line).with_category(rule.category);
            for name in rule.pattern.capture_names().flatten() {
                if let Some(value) = captures.name(name) {
                    event.fields.insert(name.to_string(), value.as_str().to_string());
                }
            }
            for (key, value) in &rule.constants {
                event.fields.insert((*key).to_string(), (*value).to_string());
            }
            for key in &rule.numeric {
                if let Some(value) = event.field(key) {
                    value.parse::<u32>().map_err(|e| {
                        StackError::Decode(format!(
                            "{} field '{}' is not a valid number ({}): {:?}",
                            rule.kind, key, e, value
                        ))
                    })?;
                }
            }

            if rule.action == RuleAction::Chat {
                let candidates = event.field("text").map(speaker_candidates).unwrap_or_default();
                if candidates.is_empty() {
                    return Ok(Event::junk(timestamp, line));
                }
                event = event.with_candidates(candidates);
            }

            return Ok(event);
        }

        Ok(Event::junk(timestamp, line))
    }

    /// Decode a batch of complete lines in order, converting per-line
    /// failures into `error` events.
    pub fn decode_lines<'a, I>(&self, lines: I, timestamp: DateTime<Utc>) -> Vec<Event>
    where
        I: IntoIterator<Item = &'a str>,
    {
        lines
            .into_iter()
            .map(|line| {
                self.decode(line, timestamp).unwrap_or_else(|e| {
                    tracing::debug!("Failed to decode line {:?}: {}", line, e);
                    Event::error(timestamp, e.to_string(), line)
                })
            })
            .collect()
    }

    /// Whether `kind` is produced by any rule in this table.
    pub fn produces(&self, kind: EventType) -> bool {
        self.rules.iter().any(|rule| rule.kind == kind)
    }
}

#[cfg(test)]
mod tests;
