//! The ordered rule table for zserv-style logs
//!
//! Order is priority: the first matching rule wins. Chat and frags are by far
//! the most common lines, so they are tried first; the catch-all server line
//! sits last.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::event::{EventCategory, EventType};

/// How a matching line is turned into an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// Named captures become fields.
    Fields,
    /// Ambiguous chat line; the speaker is resolved later from candidates.
    Chat,
}

/// One pattern in the decoder's table
#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: Regex,
    pub kind: EventType,
    pub category: EventCategory,
    pub action: RuleAction,
    /// Constant fields added to every match (weapon names and the like).
    pub constants: Vec<(&'static str, &'static str)>,
    /// Captures that must parse as unsigned integers.
    pub numeric: Vec<&'static str>,
}

impl Rule {
    pub fn new(kind: EventType, pattern: &str) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("Invalid regex pattern"),
            kind,
            category: kind.default_category(),
            action: RuleAction::Fields,
            constants: Vec::new(),
            numeric: Vec::new(),
        }
    }

    pub fn category(mut self, category: EventCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with(mut self, key: &'static str, value: &'static str) -> Self {
        self.constants.push((key, value));
        self
    }

    pub fn numeric(mut self, keys: &[&'static str]) -> Self {
        self.numeric.extend_from_slice(keys);
        self
    }

    pub fn chat(mut self) -> Self {
        self.action = RuleAction::Chat;
        self
    }
}

fn frag(phrase: &str, weapon: &'static str) -> Rule {
    Rule::new(
        EventType::Frag,
        &format!(r"^> (?P<fragged>.+) {phrase}\.$"),
    )
    .with("weapon", weapon)
}

fn death(phrase: &str, weapon: &'static str, suicide: bool) -> Rule {
    Rule::new(EventType::Death, &format!(r"^> (?P<fragged>.+) {phrase}\.$"))
        .with("weapon", weapon)
        .with("suicide", if suicide { "true" } else { "false" })
}

fn flag(verb: &str, kind: EventType) -> Rule {
    Rule::new(kind, &format!(r"^> (?P<player>.+) {verb} the (?P<team>\w+) flag\.?$"))
}

pub static DEFAULT_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::new(EventType::Message, r"^<(?P<text>.*> .*)$").chat(),
        // frags
        frag(r"was splattered by (?P<fragger>.+)'s BFG", "bfg"),
        frag(r"was melted by (?P<fragger>.+)'s plasma gun", "plasma_gun"),
        frag(r"rode (?P<fragger>.+)'s rocket", "rocket_launcher"),
        frag(r"almost dodged (?P<fragger>.+)'s rocket", "rocket_launcher"),
        frag(r"was mowed down by (?P<fragger>.+)'s chaingun", "chaingun"),
        frag(r"was ripped by (?P<fragger>.+)'s super shotgun", "super_shotgun"),
        frag(r"chewed on (?P<fragger>.+)'s boomstick", "shotgun"),
        frag(r"was tickled by (?P<fragger>.+)'s pea shooter", "pistol"),
        frag(r"was mowed over by (?P<fragger>.+)'s chainsaw", "chainsaw"),
        frag(r"chewed on (?P<fragger>.+)'s fist", "fist"),
        frag(r"was telefragged by (?P<fragger>.+)", "telefrag"),
        // environment and suicides
        death("died", "unknown", false),
        death("fell too far", "falling", false),
        death("melted", "slime", false),
        death("can't swim", "water", false),
        death("was squished", "crusher", false),
        death("killed (?:himself|herself|itself)", "self", true),
        death("should have stood back", "rocket_launcher", true),
        // flags
        flag("has taken", EventType::FlagTouch),
        flag("picked up", EventType::FlagPick),
        flag("lost", EventType::FlagLoss),
        flag("returned", EventType::FlagReturn),
        Rule::new(
            EventType::FlagCap,
            r"^> (?P<player>.+) scored for the (?P<team>\w+) team!?$",
        ),
        // connection family
        Rule::new(
            EventType::Connection,
            r"^> (?P<player>.+) \((?P<ip>\d{1,3}(?:\.\d{1,3}){3}):(?P<port>\d+)\) has connected\.?$",
        )
        .numeric(&["port"]),
        Rule::new(EventType::Disconnection, r"^> (?P<player>.+) disconnected\.?$"),
        Rule::new(EventType::AddbotCommand, r"^> Bot (?P<player>.+) joined the game\.?$"),
        Rule::new(EventType::GameJoin, r"^> (?P<player>.+) has joined the game\.?$"),
        Rule::new(
            EventType::TeamJoin,
            r"^> (?P<player>.+) is now on the (?P<team>\w+) team\.?$",
        ),
        Rule::new(EventType::GameLeave, r"^> (?P<player>.+) left the game\.?$"),
        // map change
        Rule::new(EventType::MapChange, r"^map(?P<number>\d+): (?P<name>.*)$").numeric(&["number"]),
        // rcon
        Rule::new(
            EventType::RconGranted,
            r"^> RCON access for (?P<player>.+) is granted!?$",
        ),
        Rule::new(EventType::RconDenied, r"^> RCON access for (?P<player>.+) denied!?$"),
        Rule::new(
            EventType::RconAction,
            r"^> (?P<player>.+) RCON \((?P<action>.+) \)$",
        ),
        // command echoes
        Rule::new(
            EventType::PlayersCommand,
            r"^\s*(?P<number>\d+):\s+(?P<player>.+) \((?P<ip>\d{1,3}(?:\.\d{1,3}){3})(?::(?P<port>\d+))?\)$",
        )
        .numeric(&["number", "port"]),
        Rule::new(
            EventType::BanlistCommand,
            r"^(?P<ip>[\d*]{1,3}(?:\.[\d*]{1,3}){3}) #(?P<reason>.*)$",
        ),
        Rule::new(
            EventType::WadsCommand,
            r"^\s*(?P<number>\d+)\. (?P<wad>\S+\.(?i:wad|pk3|zip))$",
        )
        .numeric(&["number"]),
        Rule::new(
            EventType::MaplistCommand,
            r"^\s*(?P<number>\d+)\. (?P<map>(?i:map\d{2}|e\dm\d))$",
        )
        .numeric(&["number"]),
        Rule::new(
            EventType::GetCommand,
            r#"^"(?P<variable>[^"]+)" is "(?P<value>.*)"$"#,
        ),
        Rule::new(
            EventType::SetCommand,
            r#"^"(?P<variable>[^"]+)" set to "(?P<value>.*)"$"#,
        ),
        Rule::new(
            EventType::KickCommand,
            r"^> (?P<player>.+) was kicked from the game\.?(?: \((?P<reason>.*)\))?$",
        ),
        Rule::new(
            EventType::AddbanCommand,
            r"^> Added (?P<ip>\S+) to the ban list\.?(?: \((?P<reason>.*)\))?$",
        ),
        // anything else the server says
        Rule::new(EventType::Message, r"^> (?P<contents>.*)$").category(EventCategory::Server),
    ]
});
