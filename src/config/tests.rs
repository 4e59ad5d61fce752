use super::*;
use crate::error::StackError;
use tempfile::TempDir;

fn parse(toml: &str) -> StackConfig {
    load_from_str(toml).unwrap()
}

fn config_error(config: &StackConfig) -> String {
    match config.resolve() {
        Err(StackError::Config(msg)) => msg,
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[test]
fn test_defaults_apply_when_omitted() {
    let config = parse(
        r#"
        [[server]]
        name = "ctf1"
        command = "zserv -port 10666"
        "#,
    );
    assert_eq!(config.defaults, Defaults::default());

    let servers = config.resolve().unwrap();
    let ctf1 = &servers[0];
    assert_eq!(ctf1.command.program, "zserv");
    assert_eq!(ctf1.log_dir, PathBuf::from("logs"));
    assert_eq!(ctf1.log_file_pattern, "gen-%Y%m%d.log");
    assert_eq!(ctf1.mode, GameMode::Deathmatch);
    assert_eq!(ctf1.poll_interval, Duration::from_millis(50));
    assert_eq!(ctf1.timeouts.start, Duration::from_secs(2));
    assert_eq!(ctf1.timeouts.finish, Duration::from_secs(1));
    assert_eq!(ctf1.game.remembered_rounds, 5);
    assert!(ctf1.game.create_unseen_players);
    assert!(ctf1.events_enabled);
    assert!(!ctf1.replay_existing_log);
}

#[test]
fn test_server_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let config = parse(&format!(
        r#"
        [defaults]
        poll_interval = "100ms"
        remembered_rounds = 3

        [defaults.restart]
        min_uptime = "30s"
        max_fast_crashes = 2

        [[server]]
        name = "ctf1"
        command = "zserv -port 10666 +sv_hostname 'Friday CTF'"
        working_dir = "{}"
        mode = "ctf"
        poll_interval = "20ms"
        response_start_timeout = "5s"
        archive_path = "rounds.jsonl"
        plugins = ["rcon_audit"]

        [[server]]
        name = "duel"
        command = "zserv -port 10667"
        log_dir = "/var/log/zserv/duel"
        mode = "duel"
        remembered_rounds = 10
        "#,
        dir.path().display()
    ));

    let servers = config.resolve().unwrap();
    let (ctf1, duel) = (&servers[0], &servers[1]);

    assert_eq!(ctf1.command.args.last().unwrap(), "Friday CTF");
    assert_eq!(ctf1.command.working_dir.as_deref(), Some(dir.path()));
    assert_eq!(ctf1.log_dir, dir.path().join("logs"));
    assert_eq!(ctf1.archive_path, Some(dir.path().join("rounds.jsonl")));
    assert_eq!(ctf1.mode, GameMode::Ctf);
    assert_eq!(ctf1.poll_interval, Duration::from_millis(20));
    assert_eq!(ctf1.timeouts.start, Duration::from_secs(5));
    assert_eq!(ctf1.game.remembered_rounds, 3);
    assert_eq!(ctf1.supervisor.restart.min_uptime, Duration::from_secs(30));
    assert_eq!(ctf1.supervisor.restart.max_fast_crashes, 2);
    assert_eq!(ctf1.supervisor.restart.initial_delay, Duration::from_secs(1));

    assert_eq!(duel.log_dir, PathBuf::from("/var/log/zserv/duel"));
    assert_eq!(duel.poll_interval, Duration::from_millis(100));
    assert_eq!(duel.game.remembered_rounds, 10);
}

#[test]
fn test_rejects_empty_stack() {
    assert!(config_error(&parse("")).contains("no [[server]]"));
}

#[test]
fn test_rejects_duplicate_and_empty_names() {
    let dup = parse(
        r#"
        [[server]]
        name = "ctf1"
        command = "zserv"
        [[server]]
        name = "ctf1"
        command = "zserv"
        "#,
    );
    assert!(config_error(&dup).contains("duplicate server name 'ctf1'"));

    let empty = parse(
        r#"
        [[server]]
        name = "  "
        command = "zserv"
        "#,
    );
    assert!(config_error(&empty).contains("must not be empty"));
}

#[test]
fn test_rejects_bad_commands_and_paths() {
    let unbalanced = parse(
        r#"
        [[server]]
        name = "ctf1"
        command = "zserv \"-port"
        "#,
    );
    assert!(config_error(&unbalanced).contains("ctf1"));

    let missing_exe = parse(
        r#"
        [[server]]
        name = "ctf1"
        command = "/nonexistent/zserv -port 10666"
        "#,
    );
    assert!(config_error(&missing_exe).contains("does not exist"));

    let missing_dir = parse(
        r#"
        [[server]]
        name = "ctf1"
        command = "zserv"
        working_dir = "/nonexistent/ctf1"
        "#,
    );
    assert!(config_error(&missing_dir).contains("working_dir"));
}

#[test]
fn test_rejects_zero_values_and_unknown_plugins() {
    let zero_timeout = parse(
        r#"
        [[server]]
        name = "ctf1"
        command = "zserv"
        response_finish_timeout = "0s"
        "#,
    );
    assert!(config_error(&zero_timeout).contains("response_finish_timeout"));

    let zero_rounds = parse(
        r#"
        [defaults]
        remembered_rounds = 0
        [[server]]
        name = "ctf1"
        command = "zserv"
        "#,
    );
    assert!(config_error(&zero_rounds).contains("remembered_rounds"));

    let plugin = parse(
        r#"
        [[server]]
        name = "ctf1"
        command = "zserv"
        plugins = ["stats_uploader"]
        "#,
    );
    let msg = config_error(&plugin);
    assert!(msg.contains("unknown plugin 'stats_uploader'"));
    assert!(msg.contains("welcome"));
}

#[test]
fn test_rejects_invalid_log_pattern() {
    let config = parse(
        r#"
        [[server]]
        name = "ctf1"
        command = "zserv"
        log_file_pattern = "gen-%!.log"
        "#,
    );
    assert!(config_error(&config).contains("strftime"));
}

#[test]
fn test_unknown_mode_is_a_toml_error() {
    let err = load_from_str(
        r#"
        [[server]]
        name = "ctf1"
        command = "zserv"
        mode = "capture"
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, StackError::Toml(_)));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_load_reads_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stack.toml");
    std::fs::write(
        &path,
        "[[server]]\nname = \"ctf1\"\ncommand = \"zserv\"\n",
    )
    .unwrap();

    let config = load(Some(&path)).await.unwrap();
    assert_eq!(config.server_names(), vec!["ctf1"]);

    let missing = load(Some(&dir.path().join("nope.toml"))).await.unwrap_err();
    assert!(matches!(missing, StackError::Config(_)));
}
