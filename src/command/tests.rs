use super::*;
use crate::decoder::LineDecoder;
use crate::listener::{EventHandler, EventListener, EventSender, HandlerTable};
use crate::tailer::{system_clock, LogParser};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::OnceLock;

/// Stands in for the game server: every command pops the next scripted log
/// excerpt, which is parsed in fixed-size chunks and fed to the listener.
struct ScriptedSink {
    sent: std::sync::Mutex<Vec<String>>,
    scripts: std::sync::Mutex<VecDeque<String>>,
    parser: std::sync::Mutex<LogParser>,
    chunk: usize,
    listener: OnceLock<EventSender>,
}

#[async_trait]
impl CommandSink for ScriptedSink {
    async fn send_line(&self, line: &str) -> crate::error::Result<()> {
        self.sent.lock().unwrap().push(line.to_string());
        let Some(script) = self.scripts.lock().unwrap().pop_front() else {
            return Ok(());
        };
        let listener = self.listener.get().expect("listener wired");
        let mut parser = self.parser.lock().unwrap();
        for chunk in script.as_bytes().chunks(self.chunk) {
            for event in parser.feed(chunk) {
                listener.send(event);
            }
        }
        Ok(())
    }
}

struct Harness {
    channel: Arc<CommandChannel>,
    sink: Arc<ScriptedSink>,
    listener: EventListener,
}

fn harness(scripts: &[&str], chunk: usize, timeouts: ResponseTimeouts) -> Harness {
    let sink = Arc::new(ScriptedSink {
        sent: Default::default(),
        scripts: std::sync::Mutex::new(scripts.iter().map(|s| s.to_string()).collect()),
        parser: std::sync::Mutex::new(LogParser::new(LineDecoder::new(), system_clock())),
        chunk,
        listener: OnceLock::new(),
    });
    let channel = Arc::new(CommandChannel::new(
        "test",
        sink.clone() as Arc<dyn CommandSink>,
        timeouts,
    ));
    let listener = EventListener::spawn(
        "commands",
        HandlerTable::new().fallback(Arc::new(channel.correlator()) as Arc<dyn EventHandler>),
    );
    let _ = sink.listener.set(listener.sender());
    Harness {
        channel,
        sink,
        listener,
    }
}

fn short() -> ResponseTimeouts {
    ResponseTimeouts {
        start: Duration::from_millis(100),
        finish: Duration::from_millis(100),
    }
}

const THREE_PLAYERS: &str = "1:  Alice (1.2.3.4)\n\
    2:  Bob (5.6.7.8:10667)\n\
    3:  Carol (9.9.9.9)\n\
    R_Init: init textures\n";

#[tokio::test]
async fn test_players_response_is_independent_of_chunking() {
    for chunk in [1, 2, 3, 7, 16, THREE_PLAYERS.len()] {
        let h = harness(&[THREE_PLAYERS], chunk, ResponseTimeouts::default());
        let response = h
            .channel
            .send("players", Some(EventType::PlayersCommand))
            .await
            .unwrap();

        let events = response.events();
        assert_eq!(events.len(), 3, "chunk size {chunk}");
        assert!(events.iter().all(|e| e.kind == EventType::PlayersCommand));
        let names: Vec<_> = events.iter().filter_map(|e| e.field("player")).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
    }
}

#[tokio::test]
async fn test_players_stops_at_first_other_line() {
    let h = harness(
        &["1:  Alice (1.2.3.4)\n2:  Bob (5.6.7.8)\n> Something else happened\n"],
        5,
        ResponseTimeouts::default(),
    );
    let players = h.channel.players().await.unwrap();
    assert_eq!(players.len(), 2);
    assert_eq!(players[0].name, "Alice");
    assert_eq!(players[1].ip, "5.6.7.8");
    assert_eq!(h.sink.sent.lock().unwrap().as_slice(), ["players"]);
}

#[tokio::test]
async fn test_unrelated_lines_before_response_are_ignored() {
    let h = harness(
        &["> Alice has joined the game.\n\"sv_gravity\" is \"800\"\nmap02: Underhalls\n"],
        4,
        ResponseTimeouts::default(),
    );
    let var = h.channel.get("sv_gravity").await.unwrap().unwrap();
    assert_eq!(var.value, "800");
}

#[tokio::test]
async fn test_start_timeout_and_late_events_discarded() {
    let h = harness(&[], 8, short());
    let err = h
        .channel
        .send("players", Some(EventType::PlayersCommand))
        .await
        .unwrap_err();
    match err {
        StackError::CommandTimeout {
            stage, collected, ..
        } => {
            assert_eq!(stage, TimeoutStage::Start);
            assert_eq!(collected, 0);
        }
        other => panic!("expected a timeout, got {other:?}"),
    }

    // the late answer arrives after the caller gave up
    let decoder = LineDecoder::new();
    for line in ["1:  Late (1.1.1.1)", "> done"] {
        h.listener.sender().send(decoder.decode(line, chrono::Utc::now()).unwrap());
    }
    assert!(h.listener.wait_idle(Duration::from_secs(1)).await);

    h.sink
        .scripts
        .lock()
        .unwrap()
        .push_back("1:  Zed (2.2.2.2)\n> Zed has joined the game.\n".to_string());
    let players = h.channel.players().await.unwrap();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].name, "Zed");
}

#[tokio::test]
async fn test_finish_timeout_reports_partial_collection() {
    let h = harness(&["1:  Alice (1.2.3.4)\n2:  Bob (5.6.7.8)\n"], 64, short());
    let err = h.channel.players().await.unwrap_err();
    assert!(err.is_timeout());
    assert!(matches!(
        err,
        StackError::CommandTimeout {
            stage: TimeoutStage::Finish,
            collected: 2,
            ..
        }
    ));
}

#[tokio::test]
async fn test_logging_disabled_returns_no_response() {
    let h = harness(&[], 8, short());
    h.channel.set_logging_enabled(false);
    let response = h
        .channel
        .send("players", Some(EventType::PlayersCommand))
        .await
        .unwrap();
    assert_eq!(response, CommandResponse::NoResponse);
    assert!(h.channel.players().await.unwrap().is_empty());
    assert_eq!(h.sink.sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_commands_without_echo_return_after_write() {
    let h = harness(&[], 8, short());
    let response = h
        .channel
        .execute(&ServerCommand::Say("gl hf".into()))
        .await
        .unwrap();
    assert_eq!(response, CommandResponse::Sent);
    assert_eq!(h.sink.sent.lock().unwrap().as_slice(), ["say gl hf"]);
}

#[tokio::test]
async fn test_invalid_command_is_never_written() {
    let h = harness(&[], 8, short());
    let err = h.channel.send("players\nkick 1", None).await.unwrap_err();
    assert!(matches!(err, StackError::InvalidCommand(_)));
    assert!(h.sink.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_commands_are_serialized() {
    let h = harness(
        &[
            "1:  Alice (1.2.3.4)\n2:  Bob (5.6.7.8)\n> x\n",
            "1:  Carol (9.9.9.9)\n> y\n",
        ],
        3,
        ResponseTimeouts::default(),
    );
    let first = tokio::spawn({
        let channel = Arc::clone(&h.channel);
        async move { channel.players().await }
    });
    let second = tokio::spawn({
        let channel = Arc::clone(&h.channel);
        async move { channel.players().await }
    });

    let mut sizes = vec![
        first.await.unwrap().unwrap().len(),
        second.await.unwrap().unwrap().len(),
    ];
    sizes.sort();
    assert_eq!(sizes, vec![1, 2]);
}
