//! Game-mode capabilities
//!
//! Modes differ in whether players are grouped into teams and whether flags
//! are tracked. Each mode is a [`ModeRules`] value that hands out the
//! capability objects it supports; [`rules_for`] picks the value once when
//! the game state is built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::team::TeamColor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Deathmatch,
    #[serde(rename = "teamdm")]
    TeamDeathmatch,
    Ctf,
    Coop,
    Duel,
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Deathmatch => "deathmatch",
            GameMode::TeamDeathmatch => "teamdm",
            GameMode::Ctf => "ctf",
            GameMode::Coop => "coop",
            GameMode::Duel => "duel",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deathmatch" | "dm" => Ok(GameMode::Deathmatch),
            "teamdm" | "tdm" => Ok(GameMode::TeamDeathmatch),
            "ctf" => Ok(GameMode::Ctf),
            "coop" => Ok(GameMode::Coop),
            "duel" => Ok(GameMode::Duel),
            other => Err(format!("unknown game mode '{other}'")),
        }
    }
}

/// Players are grouped into colored teams.
pub trait HasTeams: Send + Sync {
    fn team_colors(&self) -> &[TeamColor];

    fn has_team(&self, color: TeamColor) -> bool {
        self.team_colors().contains(&color)
    }
}

/// Flags exist and their possession is tracked.
pub trait HasFlagStats: Send + Sync {
    fn flag_colors(&self) -> &[TeamColor];
}

pub trait ModeRules: Send + Sync {
    fn mode(&self) -> GameMode;

    fn as_teams(&self) -> Option<&dyn HasTeams> {
        None
    }

    fn as_flags(&self) -> Option<&dyn HasFlagStats> {
        None
    }
}

const TWO_TEAMS: [TeamColor; 2] = [TeamColor::Red, TeamColor::Blue];

struct FreeForAll(GameMode);

impl ModeRules for FreeForAll {
    fn mode(&self) -> GameMode {
        self.0
    }
}

struct TeamPlay;

impl HasTeams for TeamPlay {
    fn team_colors(&self) -> &[TeamColor] {
        &TWO_TEAMS
    }
}

impl ModeRules for TeamPlay {
    fn mode(&self) -> GameMode {
        GameMode::TeamDeathmatch
    }

    fn as_teams(&self) -> Option<&dyn HasTeams> {
        Some(self)
    }
}

struct CaptureTheFlag;

impl HasTeams for CaptureTheFlag {
    fn team_colors(&self) -> &[TeamColor] {
        &TWO_TEAMS
    }
}

impl HasFlagStats for CaptureTheFlag {
    fn flag_colors(&self) -> &[TeamColor] {
        &TWO_TEAMS
    }
}

impl ModeRules for CaptureTheFlag {
    fn mode(&self) -> GameMode {
        GameMode::Ctf
    }

    fn as_teams(&self) -> Option<&dyn HasTeams> {
        Some(self)
    }

    fn as_flags(&self) -> Option<&dyn HasFlagStats> {
        Some(self)
    }
}

pub fn rules_for(mode: GameMode) -> Box<dyn ModeRules> {
    match mode {
        GameMode::Deathmatch | GameMode::Coop | GameMode::Duel => Box::new(FreeForAll(mode)),
        GameMode::TeamDeathmatch => Box::new(TeamPlay),
        GameMode::Ctf => Box::new(CaptureTheFlag),
    }
}
