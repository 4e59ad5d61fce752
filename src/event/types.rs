//! Event type and category enumerations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Broad grouping of event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Chat,
    Frag,
    Flag,
    Join,
    Connection,
    Map,
    Rcon,
    Command,
    Server,
    Lifecycle,
    Error,
    Junk,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Chat => "chat",
            EventCategory::Frag => "frag",
            EventCategory::Flag => "flag",
            EventCategory::Join => "join",
            EventCategory::Connection => "connection",
            EventCategory::Map => "map",
            EventCategory::Rcon => "rcon",
            EventCategory::Command => "command",
            EventCategory::Server => "server",
            EventCategory::Lifecycle => "lifecycle",
            EventCategory::Error => "error",
            EventCategory::Junk => "junk",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every kind of event the decoder or the supervisor can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Message,
    Frag,
    Death,
    FlagTouch,
    FlagPick,
    FlagLoss,
    FlagReturn,
    FlagCap,
    Connection,
    Disconnection,
    GameJoin,
    TeamJoin,
    GameLeave,
    MapChange,
    RconGranted,
    RconDenied,
    RconAction,
    PlayersCommand,
    BanlistCommand,
    WadsCommand,
    MaplistCommand,
    GetCommand,
    SetCommand,
    KickCommand,
    AddbanCommand,
    AddbotCommand,
    ProcessExit,
    Error,
    Junk,
}

impl EventType {
    pub const ALL: &'static [EventType] = &[
        EventType::Message,
        EventType::Frag,
        EventType::Death,
        EventType::FlagTouch,
        EventType::FlagPick,
        EventType::FlagLoss,
        EventType::FlagReturn,
        EventType::FlagCap,
        EventType::Connection,
        EventType::Disconnection,
        EventType::GameJoin,
        EventType::TeamJoin,
        EventType::GameLeave,
        EventType::MapChange,
        EventType::RconGranted,
        EventType::RconDenied,
        EventType::RconAction,
        EventType::PlayersCommand,
        EventType::BanlistCommand,
        EventType::WadsCommand,
        EventType::MaplistCommand,
        EventType::GetCommand,
        EventType::SetCommand,
        EventType::KickCommand,
        EventType::AddbanCommand,
        EventType::AddbotCommand,
        EventType::ProcessExit,
        EventType::Error,
        EventType::Junk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Message => "message",
            EventType::Frag => "frag",
            EventType::Death => "death",
            EventType::FlagTouch => "flag_touch",
            EventType::FlagPick => "flag_pick",
            EventType::FlagLoss => "flag_loss",
            EventType::FlagReturn => "flag_return",
            EventType::FlagCap => "flag_cap",
            EventType::Connection => "connection",
            EventType::Disconnection => "disconnection",
            EventType::GameJoin => "game_join",
            EventType::TeamJoin => "team_join",
            EventType::GameLeave => "game_leave",
            EventType::MapChange => "map_change",
            EventType::RconGranted => "rcon_granted",
            EventType::RconDenied => "rcon_denied",
            EventType::RconAction => "rcon_action",
            EventType::PlayersCommand => "players_command",
            EventType::BanlistCommand => "banlist_command",
            EventType::WadsCommand => "wads_command",
            EventType::MaplistCommand => "maplist_command",
            EventType::GetCommand => "get_command",
            EventType::SetCommand => "set_command",
            EventType::KickCommand => "kick_command",
            EventType::AddbanCommand => "addban_command",
            EventType::AddbotCommand => "addbot_command",
            EventType::ProcessExit => "process_exit",
            EventType::Error => "error",
            EventType::Junk => "junk",
        }
    }

    /// Category a decoded event of this type is filed under.
    ///
    /// `Message` is the one type whose category depends on the line shape
    /// (chat vs. server text); this returns the chat category for it.
    pub fn default_category(&self) -> EventCategory {
        match self {
            EventType::Message => EventCategory::Chat,
            EventType::Frag | EventType::Death => EventCategory::Frag,
            EventType::FlagTouch
            | EventType::FlagPick
            | EventType::FlagLoss
            | EventType::FlagReturn
            | EventType::FlagCap => EventCategory::Flag,
            EventType::Connection | EventType::Disconnection => EventCategory::Connection,
            EventType::GameJoin | EventType::TeamJoin | EventType::GameLeave => EventCategory::Join,
            EventType::MapChange => EventCategory::Map,
            EventType::RconGranted | EventType::RconDenied | EventType::RconAction => {
                EventCategory::Rcon
            }
            EventType::PlayersCommand
            | EventType::BanlistCommand
            | EventType::WadsCommand
            | EventType::MaplistCommand
            | EventType::GetCommand
            | EventType::SetCommand
            | EventType::KickCommand
            | EventType::AddbanCommand
            | EventType::AddbotCommand => EventCategory::Command,
            EventType::ProcessExit => EventCategory::Lifecycle,
            EventType::Error => EventCategory::Error,
            EventType::Junk => EventCategory::Junk,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown event type: {s}"))
    }
}
