use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::arena::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamColor {
    Red,
    Blue,
    Green,
    White,
}

impl TeamColor {
    pub const ALL: [TeamColor; 4] = [
        TeamColor::Red,
        TeamColor::Blue,
        TeamColor::Green,
        TeamColor::White,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TeamColor::Red => "red",
            TeamColor::Blue => "blue",
            TeamColor::Green => "green",
            TeamColor::White => "white",
        }
    }
}

impl fmt::Display for TeamColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeamColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "red" => Ok(TeamColor::Red),
            "blue" => Ok(TeamColor::Blue),
            "green" => Ok(TeamColor::Green),
            "white" => Ok(TeamColor::White),
            other => Err(format!("unknown team color '{other}'")),
        }
    }
}

/// A team persists for the lifetime of the server; only its node, and with
/// it the counters, is replaced each round.
#[derive(Debug, Clone)]
pub struct Team {
    pub color: TeamColor,
    pub node: NodeId,
}

impl Team {
    pub fn new(color: TeamColor, node: NodeId) -> Self {
        Self { color, node }
    }
}
