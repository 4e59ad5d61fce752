//! Per-player aggregates

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::arena::NodeId;
use super::team::TeamColor;

/// Two tallies indexed by the same keys.
///
/// A key recorded on either side is inserted into both, so a report can
/// read any key from either table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PairedTally {
    pub frags: BTreeMap<String, u64>,
    pub deaths: BTreeMap<String, u64>,
}

impl PairedTally {
    fn ensure(&mut self, key: &str) {
        if !self.frags.contains_key(key) {
            self.frags.insert(key.to_string(), 0);
            self.deaths.insert(key.to_string(), 0);
        }
    }

    pub fn record_frag(&mut self, key: &str) {
        self.ensure(key);
        *self.frags.entry(key.to_string()).or_default() += 1;
    }

    pub fn record_death(&mut self, key: &str) {
        self.ensure(key);
        *self.deaths.entry(key.to_string()).or_default() += 1;
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.frags.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.frags.clear();
        self.deaths.clear();
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    pub ip: Option<String>,
    pub port: Option<u16>,
    /// How many times this name has connected without being purged
    pub instances: u32,
    pub team: Option<TeamColor>,
    pub playing: bool,
    /// Color of the flag this player carries, if any
    pub carrying: Option<TeamColor>,
    pub node: NodeId,
    pub weapons: PairedTally,
    pub opponents: PairedTally,
    pub connected_at: DateTime<Utc>,
}

impl Player {
    pub fn new(name: impl Into<String>, node: NodeId, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            ip: None,
            port: None,
            instances: 1,
            team: None,
            playing: false,
            carrying: None,
            node,
            weapons: PairedTally::default(),
            opponents: PairedTally::default(),
            connected_at: now,
        }
    }

    pub fn has_flag(&self) -> bool {
        self.carrying.is_some()
    }
}
