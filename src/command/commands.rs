//! Typed server commands and the records their responses decode into

use serde::{Deserialize, Serialize};

use crate::error::{Result, StackError};
use crate::event::{Event, EventType};

/// Commands with a known wire form and, where the server echoes one, the
/// event type of their response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCommand {
    Players,
    Wads,
    Maplist,
    Banlist,
    Get { variable: String },
    Set { variable: String, value: String },
    Kick { number: u32, reason: Option<String> },
    AddBan { ip: String, reason: Option<String> },
    AddBot { name: Option<String> },
    Say(String),
    Map(String),
    Raw(String),
}

/// Backslash-escape `"` and `\` for a double-quoted console argument.
fn quote_escaped(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl ServerCommand {
    pub fn to_line(&self) -> String {
        fn with_reason(base: String, reason: &Option<String>) -> String {
            match reason {
                Some(reason) if !reason.is_empty() => format!("{base} {reason}"),
                _ => base,
            }
        }

        match self {
            ServerCommand::Players => "players".to_string(),
            ServerCommand::Wads => "wads".to_string(),
            ServerCommand::Maplist => "maplist".to_string(),
            ServerCommand::Banlist => "banlist".to_string(),
            ServerCommand::Get { variable } => format!("get {variable}"),
            ServerCommand::Set { variable, value } => {
                format!("set {variable} \"{}\"", quote_escaped(value))
            }
            ServerCommand::Kick { number, reason } => with_reason(format!("kick {number}"), reason),
            ServerCommand::AddBan { ip, reason } => with_reason(format!("addban {ip}"), reason),
            ServerCommand::AddBot { name } => match name {
                Some(name) => format!("addbot {name}"),
                None => "addbot".to_string(),
            },
            ServerCommand::Say(text) => format!("say {text}"),
            ServerCommand::Map(map) => format!("map {map}"),
            ServerCommand::Raw(line) => line.clone(),
        }
    }

    pub fn expected_response(&self) -> Option<EventType> {
        match self {
            ServerCommand::Players => Some(EventType::PlayersCommand),
            ServerCommand::Wads => Some(EventType::WadsCommand),
            ServerCommand::Maplist => Some(EventType::MaplistCommand),
            ServerCommand::Banlist => Some(EventType::BanlistCommand),
            ServerCommand::Get { .. } => Some(EventType::GetCommand),
            ServerCommand::Set { .. } => Some(EventType::SetCommand),
            ServerCommand::Kick { .. } => Some(EventType::KickCommand),
            ServerCommand::AddBan { .. } => Some(EventType::AddbanCommand),
            ServerCommand::AddBot { .. } => Some(EventType::AddbotCommand),
            ServerCommand::Say(_) | ServerCommand::Map(_) | ServerCommand::Raw(_) => None,
        }
    }
}

/// Reject anything that is not a single printable ASCII line.
pub fn validate_command(line: &str) -> Result<()> {
    if line.trim().is_empty() {
        return Err(StackError::InvalidCommand("empty command".to_string()));
    }
    if let Some(bad) = line.chars().find(|c| !c.is_ascii() || c.is_ascii_control()) {
        return Err(StackError::InvalidCommand(format!(
            "{line:?} contains {bad:?}; commands must be a single ASCII line"
        )));
    }
    Ok(())
}

/// A record decoded from one response event
pub trait ResponseRecord: Sized {
    const KIND: EventType;

    fn from_event(event: &Event) -> Result<Self>;

    fn from_events(events: &[Event]) -> Result<Vec<Self>> {
        events
            .iter()
            .filter(|e| e.kind == Self::KIND)
            .map(Self::from_event)
            .collect()
    }
}

fn number(event: &Event, key: &str) -> Result<u32> {
    let raw = event.require(key)?;
    raw.parse()
        .map_err(|_| StackError::Decode(format!("field '{key}' is not a number: {raw:?}")))
}

/// One line of `players` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub number: u32,
    pub name: String,
    pub ip: String,
    pub port: Option<u16>,
}

impl ResponseRecord for PlayerRecord {
    const KIND: EventType = EventType::PlayersCommand;

    fn from_event(event: &Event) -> Result<Self> {
        let port = match event.field("port") {
            Some(port) => Some(
                port.parse()
                    .map_err(|_| StackError::Decode(format!("invalid port {port:?}")))?,
            ),
            None => None,
        };
        Ok(Self {
            number: number(event, "number")?,
            name: event.require("player")?.to_string(),
            ip: event.require("ip")?.to_string(),
            port,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    pub ip: String,
    pub reason: String,
}

impl ResponseRecord for BanRecord {
    const KIND: EventType = EventType::BanlistCommand;

    fn from_event(event: &Event) -> Result<Self> {
        Ok(Self {
            ip: event.require("ip")?.to_string(),
            reason: event.field("reason").unwrap_or_default().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WadRecord {
    pub number: u32,
    pub file: String,
}

impl ResponseRecord for WadRecord {
    const KIND: EventType = EventType::WadsCommand;

    fn from_event(event: &Event) -> Result<Self> {
        Ok(Self {
            number: number(event, "number")?,
            file: event.require("wad")?.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRecord {
    pub number: u32,
    pub map: String,
}

impl ResponseRecord for MapRecord {
    const KIND: EventType = EventType::MaplistCommand;

    fn from_event(event: &Event) -> Result<Self> {
        Ok(Self {
            number: number(event, "number")?,
            map: event.require("map")?.to_uppercase(),
        })
    }
}

/// Server variable as reported by `get`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: String,
}

impl ResponseRecord for Variable {
    const KIND: EventType = EventType::GetCommand;

    fn from_event(event: &Event) -> Result<Self> {
        Ok(Self {
            name: event.require("variable")?.to_string(),
            value: event.require("value")?.to_string(),
        })
    }
}
