//! Stack configuration
//!
//! One TOML file describes every supervised server. `[defaults]` supplies
//! the tuning knobs; each `[[server]]` table may override any of them.
//! [`StackConfig::resolve`] validates the whole file and produces one
//! [`ServerConfig`] per server with every default applied and every path
//! made absolute.

pub mod loader;
mod validate;

pub use loader::{default_config_path, load, load_from_str};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::ResponseTimeouts;
use crate::error::{Result, StackError};
use crate::stats::{GameMode, GameSettings};
use crate::supervisor::{ProcessCommand, RestartPolicy, SupervisorOptions};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default, rename = "server")]
    pub servers: Vec<ServerSection>,
}

/// Tuning shared by every server unless overridden
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde", default = "default_liveness_interval")]
    pub liveness_interval: Duration,
    #[serde(with = "humantime_serde", default = "default_rotation_check_interval")]
    pub rotation_check_interval: Duration,
    #[serde(with = "humantime_serde", default = "default_response_start_timeout")]
    pub response_start_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_response_finish_timeout")]
    pub response_finish_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_stop_timeout")]
    pub stop_timeout: Duration,
    #[serde(default = "default_remembered_rounds")]
    pub remembered_rounds: usize,
    #[serde(default = "default_true")]
    pub create_unseen_players: bool,
    /// Events in the health monitor's sliding window
    #[serde(default = "default_health_window")]
    pub health_window: usize,
    #[serde(default = "default_junk_alarm_ratio")]
    pub junk_alarm_ratio: f64,
    #[serde(default)]
    pub restart: RestartPolicy,
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(50)
}

fn default_liveness_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_rotation_check_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_response_start_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_response_finish_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_remembered_rounds() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_health_window() -> usize {
    500
}

fn default_junk_alarm_ratio() -> f64 {
    0.5
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            liveness_interval: default_liveness_interval(),
            rotation_check_interval: default_rotation_check_interval(),
            response_start_timeout: default_response_start_timeout(),
            response_finish_timeout: default_response_finish_timeout(),
            stop_timeout: default_stop_timeout(),
            remembered_rounds: default_remembered_rounds(),
            create_unseen_players: true,
            health_window: default_health_window(),
            junk_alarm_ratio: default_junk_alarm_ratio(),
            restart: RestartPolicy::default(),
        }
    }
}

/// One `[[server]]` table as written in the file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    pub name: String,
    /// Shell-style command line
    pub command: String,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// chrono strftime pattern, evaluated in local time
    #[serde(default = "default_log_file_pattern")]
    pub log_file_pattern: String,
    #[serde(default = "default_mode")]
    pub mode: GameMode,
    #[serde(default = "default_true")]
    pub events_enabled: bool,
    #[serde(default)]
    pub replay_existing_log: bool,
    #[serde(default)]
    pub archive_path: Option<PathBuf>,
    #[serde(default)]
    pub plugins: Vec<String>,

    #[serde(default, with = "humantime_serde")]
    pub poll_interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub liveness_interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub rotation_check_interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub response_start_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub response_finish_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub stop_timeout: Option<Duration>,
    #[serde(default)]
    pub remembered_rounds: Option<usize>,
    #[serde(default)]
    pub create_unseen_players: Option<bool>,
    #[serde(default)]
    pub health_window: Option<usize>,
    #[serde(default)]
    pub junk_alarm_ratio: Option<f64>,
    #[serde(default)]
    pub restart: Option<RestartPolicy>,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_file_pattern() -> String {
    "gen-%Y%m%d.log".to_string()
}

fn default_mode() -> GameMode {
    GameMode::Deathmatch
}

/// Everything one [`Server`](crate::server::Server) needs, fully resolved
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub command: ProcessCommand,
    pub log_dir: PathBuf,
    pub log_file_pattern: String,
    pub mode: GameMode,
    pub events_enabled: bool,
    pub replay_existing_log: bool,
    pub archive_path: Option<PathBuf>,
    pub plugins: Vec<String>,
    pub poll_interval: Duration,
    pub rotation_check_interval: Duration,
    pub timeouts: ResponseTimeouts,
    pub supervisor: SupervisorOptions,
    pub game: GameSettings,
    pub health_window: usize,
    pub junk_alarm_ratio: f64,
}

impl ServerConfig {
    /// A server with every default applied.
    pub fn new(name: impl Into<String>, command: ProcessCommand, log_dir: impl Into<PathBuf>) -> Self {
        Self::with_defaults(name, command, log_dir, &Defaults::default())
    }

    fn with_defaults(
        name: impl Into<String>,
        command: ProcessCommand,
        log_dir: impl Into<PathBuf>,
        defaults: &Defaults,
    ) -> Self {
        Self {
            name: name.into(),
            command,
            log_dir: log_dir.into(),
            log_file_pattern: default_log_file_pattern(),
            mode: default_mode(),
            events_enabled: true,
            replay_existing_log: false,
            archive_path: None,
            plugins: Vec::new(),
            poll_interval: defaults.poll_interval,
            rotation_check_interval: defaults.rotation_check_interval,
            timeouts: ResponseTimeouts {
                start: defaults.response_start_timeout,
                finish: defaults.response_finish_timeout,
            },
            supervisor: SupervisorOptions {
                liveness_interval: defaults.liveness_interval,
                stop_timeout: defaults.stop_timeout,
                restart: defaults.restart,
            },
            game: GameSettings {
                create_unseen_players: defaults.create_unseen_players,
                remembered_rounds: defaults.remembered_rounds,
            },
            health_window: defaults.health_window,
            junk_alarm_ratio: defaults.junk_alarm_ratio,
        }
    }
}

impl ServerSection {
    /// Apply `defaults` and resolve relative paths against the working
    /// directory.
    fn resolve(&self, defaults: &Defaults) -> Result<ServerConfig> {
        let mut command = ProcessCommand::parse(&self.command)
            .map_err(|e| StackError::Config(format!("server '{}': {}", self.name, e)))?;
        command.env.extend(self.env.clone());
        command.working_dir = self.working_dir.clone();

        let base = self.working_dir.as_deref();
        let mut config = ServerConfig::with_defaults(
            &self.name,
            command,
            relative_to(base, &self.log_dir),
            defaults,
        );
        config.log_file_pattern = self.log_file_pattern.clone();
        config.mode = self.mode;
        config.events_enabled = self.events_enabled;
        config.replay_existing_log = self.replay_existing_log;
        config.archive_path = self.archive_path.as_deref().map(|p| relative_to(base, p));
        config.plugins = self.plugins.clone();

        if let Some(v) = self.poll_interval {
            config.poll_interval = v;
        }
        if let Some(v) = self.rotation_check_interval {
            config.rotation_check_interval = v;
        }
        if let Some(v) = self.response_start_timeout {
            config.timeouts.start = v;
        }
        if let Some(v) = self.response_finish_timeout {
            config.timeouts.finish = v;
        }
        if let Some(v) = self.liveness_interval {
            config.supervisor.liveness_interval = v;
        }
        if let Some(v) = self.stop_timeout {
            config.supervisor.stop_timeout = v;
        }
        if let Some(v) = self.restart {
            config.supervisor.restart = v;
        }
        if let Some(v) = self.remembered_rounds {
            config.game.remembered_rounds = v;
        }
        if let Some(v) = self.create_unseen_players {
            config.game.create_unseen_players = v;
        }
        if let Some(v) = self.health_window {
            config.health_window = v;
        }
        if let Some(v) = self.junk_alarm_ratio {
            config.junk_alarm_ratio = v;
        }
        Ok(config)
    }
}

fn relative_to(base: Option<&Path>, path: &Path) -> PathBuf {
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

impl StackConfig {
    /// Validate and resolve every server.
    pub fn resolve(&self) -> Result<Vec<ServerConfig>> {
        validate::validate_stack(self)?;
        let servers = self
            .servers
            .iter()
            .map(|section| section.resolve(&self.defaults))
            .collect::<Result<Vec<_>>>()?;
        for server in &servers {
            validate::validate_server(server)?;
        }
        Ok(servers)
    }

    pub fn server_names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests;
