use super::*;
use crate::event::EventCategory;
use chrono::TimeZone;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 20, 0, 0).unwrap()
}

fn decode(line: &str) -> Event {
    LineDecoder::new().decode(line, now()).unwrap()
}

#[test]
fn test_frag_lines_carry_fragger_and_weapon() {
    let event = decode("> Alice was splattered by Bob's BFG.");
    assert_eq!(event.kind, EventType::Frag);
    assert_eq!(event.category, EventCategory::Frag);
    assert_eq!(event.field("fragged"), Some("Alice"));
    assert_eq!(event.field("fragger"), Some("Bob"));
    assert_eq!(event.field("weapon"), Some("bfg"));

    let event = decode("> Carol chewed on Dave's fist.");
    assert_eq!(event.field("weapon"), Some("fist"));
    assert_eq!(event.field("fragger"), Some("Dave"));
}

#[test]
fn test_deaths_and_suicides() {
    let event = decode("> Alice fell too far.");
    assert_eq!(event.kind, EventType::Death);
    assert_eq!(event.field("weapon"), Some("falling"));
    assert_eq!(event.field("suicide"), Some("false"));

    let event = decode("> Alice should have stood back.");
    assert_eq!(event.kind, EventType::Death);
    assert_eq!(event.field("suicide"), Some("true"));
}

#[test]
fn test_flag_lines() {
    let cases = [
        ("> Alice has taken the Blue flag.", EventType::FlagTouch),
        ("> Alice picked up the Blue flag.", EventType::FlagPick),
        ("> Alice lost the Blue flag.", EventType::FlagLoss),
        ("> Bob returned the Red flag.", EventType::FlagReturn),
        ("> Alice scored for the Red team!", EventType::FlagCap),
    ];
    for (line, kind) in cases {
        let event = decode(line);
        assert_eq!(event.kind, kind, "line: {line}");
        assert_eq!(event.category, EventCategory::Flag);
        assert!(event.field("player").is_some());
        assert!(event.field("team").is_some());
    }
}

#[test]
fn test_connection_family() {
    let event = decode("> Alice (1.2.3.4:10666) has connected.");
    assert_eq!(event.kind, EventType::Connection);
    assert_eq!(event.field("player"), Some("Alice"));
    assert_eq!(event.field("ip"), Some("1.2.3.4"));
    assert_eq!(event.field("port"), Some("10666"));

    assert_eq!(decode("> Alice disconnected").kind, EventType::Disconnection);
    assert_eq!(decode("> Alice has joined the game.").kind, EventType::GameJoin);
    assert_eq!(decode("> Bot Tin joined the game.").kind, EventType::AddbotCommand);

    let event = decode("> Alice is now on the Red team.");
    assert_eq!(event.kind, EventType::TeamJoin);
    assert_eq!(event.field("team"), Some("Red"));
}

#[test]
fn test_map_change() {
    let event = decode("map07: Dead Simple");
    assert_eq!(event.kind, EventType::MapChange);
    assert_eq!(event.field("number"), Some("07"));
    assert_eq!(event.field("name"), Some("Dead Simple"));
}

#[test]
fn test_numeric_overflow_is_a_decode_error() {
    let decoder = LineDecoder::new();
    assert!(decoder.decode("map99999999999: Too Big", now()).is_err());

    let events = decoder.decode_lines(["map99999999999: Too Big", "map01: Entryway"], now());
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, EventType::Error);
    assert_eq!(events[0].field("trace"), Some("map99999999999: Too Big"));
    assert_eq!(events[1].kind, EventType::MapChange);
}

#[test]
fn test_rcon_lines() {
    assert_eq!(decode("> RCON access for Alice is granted!").kind, EventType::RconGranted);
    assert_eq!(decode("> RCON access for Alice denied!").kind, EventType::RconDenied);

    let event = decode("> Alice RCON (map map05 )");
    assert_eq!(event.kind, EventType::RconAction);
    assert_eq!(event.field("action"), Some("map map05"));
}

#[test]
fn test_command_echoes() {
    let event = decode("1:  Alice (1.2.3.4)");
    assert_eq!(event.kind, EventType::PlayersCommand);
    assert_eq!(event.field("number"), Some("1"));
    assert_eq!(event.field("player"), Some("Alice"));
    assert_eq!(event.field("port"), None);

    let event = decode(" 12:  Bob (5.6.7.8:10667)");
    assert_eq!(event.kind, EventType::PlayersCommand);
    assert_eq!(event.field("port"), Some("10667"));

    assert_eq!(decode("10.0.*.* #camping").kind, EventType::BanlistCommand);
    assert_eq!(decode("1. doom2.wad").kind, EventType::WadsCommand);
    assert_eq!(decode("2. zvox2.PK3").kind, EventType::WadsCommand);
    assert_eq!(decode("3. MAP03").kind, EventType::MaplistCommand);

    let event = decode(r#""fraglimit" is "30""#);
    assert_eq!(event.kind, EventType::GetCommand);
    assert_eq!(event.field("variable"), Some("fraglimit"));
    assert_eq!(event.field("value"), Some("30"));

    assert_eq!(decode(r#""timelimit" set to "20""#).kind, EventType::SetCommand);
    assert_eq!(
        decode("> Alice was kicked from the game. (spam)").kind,
        EventType::KickCommand
    );
    assert_eq!(decode("> Added 1.2.3.4 to the ban list.").kind, EventType::AddbanCommand);
}

#[test]
fn test_chat_line_produces_candidates() {
    let event = decode("<<!> Ladna> > hi all");
    assert_eq!(event.kind, EventType::Message);
    assert_eq!(event.category, EventCategory::Chat);
    assert!(event.candidates.contains(&"<!> Ladna> ".to_string()));
    assert!(event.candidates.contains(&"<!".to_string()));
    assert_eq!(event.raw_line, "<<!> Ladna> > hi all");

    let resolved = resolve_speaker(&event, |name| name == "<!> Ladna> ").unwrap();
    assert_eq!(resolved.speaker, "<!> Ladna> ");
    assert_eq!(resolved.text, "hi all");
}

#[test]
fn test_server_catch_all_and_junk() {
    let event = decode("> Something else happened");
    assert_eq!(event.kind, EventType::Message);
    assert_eq!(event.category, EventCategory::Server);
    assert_eq!(event.field("contents"), Some("Something else happened"));
    assert!(event.candidates.is_empty());

    let event = decode("R_Init: Init DOOM refresh daemon");
    assert_eq!(event.kind, EventType::Junk);
    assert_eq!(event.category, EventCategory::Junk);

    assert_eq!(decode("<no delimiter here>").kind, EventType::Junk);
}

#[test]
fn test_specific_rules_win_over_catch_all() {
    // every server-marked line would match the catch-all if it came first
    let decoder = LineDecoder::new();
    let last = decoder.rules().last().unwrap();
    assert_eq!(last.category, EventCategory::Server);
    assert_eq!(decode("> Alice disconnected").category, EventCategory::Connection);
}

#[test]
fn test_custom_rule_table() {
    let decoder = LineDecoder::with_rules(vec![Rule::new(EventType::GameJoin, r"^JOIN (?P<player>\S+)$")]);
    let event = decoder.decode("JOIN alice", now()).unwrap();
    assert_eq!(event.kind, EventType::GameJoin);
    assert_eq!(event.field("player"), Some("alice"));
    assert!(decoder.produces(EventType::GameJoin));
    assert!(!decoder.produces(EventType::Frag));
    assert_eq!(decoder.decode("> Alice disconnected", now()).unwrap().kind, EventType::Junk);
}
