use super::*;
use crate::command::{CommandSink, ResponseTimeouts};
use crate::decoder::LineDecoder;
use crate::event::EventType;
use crate::listener::EventListener;
use crate::stats::{GameMode, GameSettings, GameState};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

#[async_trait]
impl CommandSink for RecordingSink {
    async fn send_line(&self, line: &str) -> crate::error::Result<()> {
        self.lines.lock().await.push(line.to_string());
        Ok(())
    }
}

fn context(sink: Arc<RecordingSink>) -> PluginContext {
    PluginContext {
        server: "dm1".to_string(),
        channel: Arc::new(CommandChannel::new(
            "dm1",
            sink as Arc<dyn CommandSink>,
            ResponseTimeouts::default(),
        )),
        state: Arc::new(RwLock::new(GameState::new(
            GameMode::Deathmatch,
            GameSettings::default(),
            Utc::now(),
        ))),
    }
}

#[test]
fn test_registry_lookup() {
    assert_eq!(names().collect::<Vec<_>>(), vec!["junk_alarm", "rcon_audit", "welcome"]);
    assert!(find("welcome").is_some());
    assert!(find("autoban").is_none());
}

#[tokio::test]
async fn test_unknown_plugin_is_config_error() {
    let ctx = context(Arc::new(RecordingSink::default()));
    let Err(err) = build("autoban", &ctx) else {
        panic!("autoban is not a registered plugin");
    };
    assert!(matches!(err, StackError::Config(msg) if msg.contains("junk_alarm")));
}

#[tokio::test]
async fn test_welcome_greets_joining_players() {
    let sink = Arc::new(RecordingSink::default());
    let ctx = context(sink.clone());
    let listener = EventListener::spawn("plugin/welcome", build("welcome", &ctx).unwrap());

    let decoder = LineDecoder::new();
    for line in ["> Alice has joined the game.", "> Alice left the game."] {
        listener.sender().send(decoder.decode(line, Utc::now()).unwrap());
    }
    assert!(listener.wait_idle(Duration::from_secs(2)).await);

    assert_eq!(*sink.lines.lock().await, vec!["say Welcome, Alice!".to_string()]);
    assert_eq!(listener.stats().failed, 0);
}

#[tokio::test]
async fn test_plugin_tables_cover_their_events() {
    let ctx = context(Arc::new(RecordingSink::default()));
    let junk = build("junk_alarm", &ctx).unwrap();
    assert!(junk.handles(EventType::Junk));
    assert!(junk.handles(EventType::Error));

    let audit = build("rcon_audit", &ctx).unwrap();
    assert!(audit.handles(EventType::RconDenied));
    assert!(!audit.handles(EventType::Frag));
}
