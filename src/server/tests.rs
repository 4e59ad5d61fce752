use super::*;
use crate::command::ResponseTimeouts;
use crate::error::StackError;
use crate::stats::GameMode;
use crate::supervisor::{ExitStatus, MockHandle, MockSpawner, ProcessCommand};
use chrono::TimeZone;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};

fn test_config(dir: &Path) -> ServerConfig {
    let mut config = ServerConfig::new(
        "ctf1",
        ProcessCommand::parse("zserv -port 10666").unwrap(),
        dir.join("logs"),
    );
    config.mode = GameMode::Ctf;
    config.poll_interval = Duration::from_millis(10);
    config.supervisor.liveness_interval = Duration::from_millis(10);
    config.supervisor.stop_timeout = Duration::from_millis(200);
    config.supervisor.restart.min_uptime = Duration::ZERO;
    config.timeouts = ResponseTimeouts {
        start: Duration::from_secs(2),
        finish: Duration::from_millis(500),
    };
    config
}

async fn server(config: ServerConfig, spawner: &MockSpawner) -> Server {
    Server::new(config, Arc::new(spawner.clone()), crate::supervisor::spawn_lock())
        .await
        .unwrap()
}

fn append(path: &Path, text: &str) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Answers commands on stdin by appending to the log, like zserv echoing
/// console output.
fn fake_zserv(process: MockHandle, log: PathBuf) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(stdin) = process.take_stdin() else {
            return;
        };
        let mut lines = BufReader::new(stdin).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let reply = match line.as_str() {
                "players" => "1:  Alice (10.0.0.1:10666)\n2:  Bob (10.0.0.2)\n> Server is ready.\n",
                "get sv_hostname" => "\"sv_hostname\" is \"Friday CTF\"\n> Server is ready.\n",
                _ => continue,
            };
            append(&log, reply);
        }
    })
}

#[tokio::test]
async fn test_start_opens_todays_log_and_tracks_state() {
    let dir = TempDir::new().unwrap();
    let spawner = MockSpawner::new();
    let server = server(test_config(dir.path()), &spawner).await;

    server.start().await.unwrap();
    let log = server.tailer().file_path().await.unwrap();
    assert_eq!(log, todays_log_path(&dir.path().join("logs"), "gen-%Y%m%d.log").unwrap());

    append(
        &log,
        "map01: Entryway\n\
         > Alice (10.0.0.1:10666) has connected.\n\
         > Alice has joined the game.\n\
         > Alice is now on the Red team.\n\
         > Bob (10.0.0.2:10666) has connected.\n",
    );
    assert!(wait_until(|| async { server.players().await.len() == 2 }).await);

    assert_eq!(
        server.current_map().await,
        Some(MapInfo {
            number: 1,
            name: "Entryway".to_string()
        })
    );
    assert_eq!(server.player("Alice").await.unwrap().team, Some(TeamColor::Red));
    assert!(matches!(
        server.player("Mallory").await,
        Err(StackError::PlayerNotFound(_))
    ));
    assert_eq!(server.team(TeamColor::Red).await.unwrap().players, vec!["Alice"]);

    let status = server.status().await;
    assert_eq!(status.state, ProcessState::Running);
    assert_eq!(status.pid, Some(1000));
    assert_eq!(status.player_count, 2);
    assert_eq!(status.health.junk, 0);
    assert_eq!(status.listeners.len(), 3);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_commands_round_trip_through_the_log() {
    let dir = TempDir::new().unwrap();
    let spawner = MockSpawner::new();
    let server = server(test_config(dir.path()), &spawner).await;
    server.start().await.unwrap();

    let log = server.tailer().file_path().await.unwrap();
    let _zserv = fake_zserv(spawner.last().unwrap(), log);

    let players = server.list_players().await.unwrap();
    assert_eq!(players.len(), 2);
    assert_eq!(players[0].name, "Alice");
    assert_eq!(players[0].port, Some(10666));
    assert_eq!(players[1].ip, "10.0.0.2");

    let hostname = server.channel().get("sv_hostname").await.unwrap().unwrap();
    assert_eq!(hostname.value, "Friday CTF");

    // no echo for this one; the call returns straight after the write
    let sent = server
        .execute(&ServerCommand::Say("gg".to_string()))
        .await
        .unwrap();
    assert_eq!(sent, CommandResponse::Sent);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_command_without_process_fails() {
    let dir = TempDir::new().unwrap();
    let server = server(test_config(dir.path()), &MockSpawner::new()).await;

    let err = server.send_command("players", Some(EventType::PlayersCommand)).await.unwrap_err();
    assert!(matches!(err, StackError::ProcessNotRunning(_)));
}

#[tokio::test]
async fn test_disabled_events_return_no_response() {
    let dir = TempDir::new().unwrap();
    let spawner = MockSpawner::new();
    let mut config = test_config(dir.path());
    config.events_enabled = false;
    let server = server(config, &spawner).await;
    server.start().await.unwrap();

    let response = server
        .send_command("players", Some(EventType::PlayersCommand))
        .await
        .unwrap();
    assert_eq!(response, CommandResponse::NoResponse);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_crash_disconnects_players_and_respawns() {
    let dir = TempDir::new().unwrap();
    let spawner = MockSpawner::new();
    let server = server(test_config(dir.path()), &spawner).await;
    server.start().await.unwrap();

    let log = server.tailer().file_path().await.unwrap();
    append(&log, "> Alice (10.0.0.1:10666) has connected.\n");
    assert!(wait_until(|| async { server.status().await.player_count == 1 }).await);

    spawner.last().unwrap().exit(ExitStatus::Signal(11));
    assert!(wait_until(|| async { server.supervisor().spawn_count() == 2 }).await);
    assert!(wait_until(|| async { server.status().await.player_count == 0 }).await);
    assert!(!server.player("Alice").await.unwrap().connected);

    // the respawned process appends to the same file
    append(&log, "> Bob (10.0.0.2:10666) has connected.\n");
    assert!(wait_until(|| async { server.status().await.player_count == 1 }).await);
    assert!(server.player("Bob").await.unwrap().connected);

    server.shutdown().await.unwrap();
    assert_eq!(spawner.spawn_count(), 2);
}

#[tokio::test]
async fn test_restart_keeps_lines_written_before_it() {
    let dir = TempDir::new().unwrap();
    let spawner = MockSpawner::new();
    let server = server(test_config(dir.path()), &spawner).await;
    // no poll worker: only explicit polls read the log
    server.supervisor().start().await.unwrap();

    let log = server.tailer().file_path().await.unwrap();
    append(&log, "map01: Entryway
> Alice (10.0.0.1:10666) has connected.
");
    server.supervisor().restart().await.unwrap();
    append(&log, "> Bob (10.0.0.2:10666) has connected.
");
    assert_eq!(server.tailer().poll_once().await.unwrap(), 3);

    assert!(wait_until(|| async { server.status().await.player_count == 2 }).await);
    assert_eq!(server.current_map().await.unwrap().name, "Entryway");
    assert_eq!(spawner.spawn_count(), 2);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_replay_existing_log_on_first_start() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("logs");
    std::fs::create_dir_all(&logs).unwrap();
    let today = todays_log_path(&logs, "gen-%Y%m%d.log").unwrap();
    append(&today, "map07: Dead Simple\n> Alice (10.0.0.1:10666) has connected.\n");

    let spawner = MockSpawner::new();
    let mut config = test_config(dir.path());
    config.replay_existing_log = true;
    let replaying = server(config, &spawner).await;
    replaying.start().await.unwrap();
    assert!(wait_until(|| async { replaying.players().await.len() == 1 }).await);
    assert_eq!(replaying.current_map().await.unwrap().number, 7);
    replaying.shutdown().await.unwrap();

    let fresh = server(test_config(dir.path()), &spawner).await;
    fresh.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(fresh.players().await.is_empty());
    fresh.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_plugin_fails_construction() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.plugins = vec!["nope".to_string()];
    let result = Server::new(config, Arc::new(MockSpawner::new()), crate::supervisor::spawn_lock()).await;
    assert!(matches!(result, Err(StackError::Config(_))));
}

#[tokio::test]
async fn test_plugins_get_their_own_listener() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.plugins = vec!["rcon_audit".to_string(), "junk_alarm".to_string()];
    let server = server(config, &MockSpawner::new()).await;

    let names: Vec<_> = server.status().await.listeners.into_iter().map(|(n, _)| n).collect();
    assert_eq!(
        names,
        vec!["ctf1/stats", "ctf1/commands", "ctf1/health", "ctf1/rcon_audit", "ctf1/junk_alarm"]
    );
}

#[test]
fn test_log_path_for_formats_the_date() {
    let at = Utc.with_ymd_and_hms(2026, 10, 16, 23, 59, 0).unwrap();
    let path = log_path_for(Path::new("/srv/zserv/logs"), "gen-%Y%m%d.log", &at).unwrap();
    assert_eq!(path, PathBuf::from("/srv/zserv/logs/gen-20261016.log"));
}

#[tokio::test]
async fn test_rotation_moves_to_todays_file() {
    let dir = TempDir::new().unwrap();
    let tailer = LogTailer::new("ctf1", LineDecoder::default(), Duration::from_millis(10));
    let pattern = "gen-%Y%m%d.log";

    assert!(!rotate_if_needed(&tailer, dir.path(), pattern).await.unwrap());

    tailer
        .set_file_path(dir.path().join("gen-20000101.log"), true)
        .await
        .unwrap();
    assert!(rotate_if_needed(&tailer, dir.path(), pattern).await.unwrap());
    assert_eq!(
        tailer.file_path().await.unwrap(),
        todays_log_path(dir.path(), pattern).unwrap()
    );
    assert!(!rotate_if_needed(&tailer, dir.path(), pattern).await.unwrap());
}
