//! One map's play session and the serializable views of its aggregates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::arena::{NodeId, NodeKind, StatArena};
use super::counters::Counters;
use super::team::TeamColor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapInfo {
    pub number: u32,
    pub name: String,
}

/// The stats scope of a single map. Owns the arena every player and team
/// node of the round lives in; the round itself is the root.
#[derive(Debug, Clone)]
pub struct Round {
    pub map: Option<MapInfo>,
    pub started_at: DateTime<Utc>,
    /// Set by the first game-joining event; unplayed rounds are not kept.
    pub should_remember: bool,
    pub arena: StatArena,
    pub root: NodeId,
}

impl Round {
    pub fn new(map: Option<MapInfo>, started_at: DateTime<Utc>) -> Self {
        let mut arena = StatArena::new();
        let root = arena.insert(NodeKind::Round, None);
        Self {
            map,
            started_at,
            should_remember: false,
            arena,
            root,
        }
    }

    pub fn totals(&self) -> Counters {
        self.arena.counters(self.root)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub name: String,
    pub ip: Option<String>,
    pub instances: u32,
    pub team: Option<TeamColor>,
    pub playing: bool,
    pub has_flag: bool,
    pub connected: bool,
    pub counters: Counters,
    pub frags_by_weapon: BTreeMap<String, u64>,
    pub deaths_by_weapon: BTreeMap<String, u64>,
    pub frags_by_opponent: BTreeMap<String, u64>,
    pub deaths_by_opponent: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSnapshot {
    pub color: TeamColor,
    pub counters: Counters,
    pub players: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub map: Option<MapInfo>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub totals: Counters,
    pub teams: Vec<TeamSnapshot>,
    pub players: Vec<PlayerSnapshot>,
}
