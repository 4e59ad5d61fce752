//! Aggregate counters shared by every stat node

use serde::{Deserialize, Serialize};

/// One logical "add X" operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatOp {
    Frag,
    Death,
    Suicide,
    FlagTouch,
    FlagPick,
    FlagDrop,
    FlagReturn,
    FlagCap,
    RunnerFragged,
    RconAccess,
    RconDenial,
    RconAction,
    Message,
}

/// Running totals kept by players, teams and rounds alike
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub frags: u64,
    pub deaths: u64,
    pub suicides: u64,
    pub flag_touches: u64,
    pub flag_picks: u64,
    pub flag_drops: u64,
    pub flag_returns: u64,
    pub flag_caps: u64,
    pub runners_fragged: u64,
    pub rcon_accesses: u64,
    pub rcon_denials: u64,
    pub rcon_actions: u64,
    pub messages: u64,
}

impl Counters {
    pub fn apply(&mut self, op: StatOp) {
        let counter = match op {
            StatOp::Frag => &mut self.frags,
            StatOp::Death => &mut self.deaths,
            StatOp::Suicide => &mut self.suicides,
            StatOp::FlagTouch => &mut self.flag_touches,
            StatOp::FlagPick => &mut self.flag_picks,
            StatOp::FlagDrop => &mut self.flag_drops,
            StatOp::FlagReturn => &mut self.flag_returns,
            StatOp::FlagCap => &mut self.flag_caps,
            StatOp::RunnerFragged => &mut self.runners_fragged,
            StatOp::RconAccess => &mut self.rcon_accesses,
            StatOp::RconDenial => &mut self.rcon_denials,
            StatOp::RconAction => &mut self.rcon_actions,
            StatOp::Message => &mut self.messages,
        };
        *counter += 1;
    }

    pub fn get(&self, op: StatOp) -> u64 {
        match op {
            StatOp::Frag => self.frags,
            StatOp::Death => self.deaths,
            StatOp::Suicide => self.suicides,
            StatOp::FlagTouch => self.flag_touches,
            StatOp::FlagPick => self.flag_picks,
            StatOp::FlagDrop => self.flag_drops,
            StatOp::FlagReturn => self.flag_returns,
            StatOp::FlagCap => self.flag_caps,
            StatOp::RunnerFragged => self.runners_fragged,
            StatOp::RconAccess => self.rcon_accesses,
            StatOp::RconDenial => self.rcon_denials,
            StatOp::RconAction => self.rcon_actions,
            StatOp::Message => self.messages,
        }
    }

    /// Frags per death, with zero deaths counting as one.
    pub fn ratio(&self) -> f64 {
        self.frags as f64 / self.deaths.max(1) as f64
    }
}
