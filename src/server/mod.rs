//! One supervised game server and everything attached to it
//!
//! Construction order is fixed: game state and listeners first, then the
//! tailer feeding them, then the supervisor whose hooks open the log and
//! report exits. Nothing is spawned until [`Server::start`].

pub mod hooks;
pub mod rotation;

pub use hooks::{ExitEventHook, OpenLogHook};
pub use rotation::{log_path_for, rotate_if_needed, todays_log_path, RotationTask};

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::command::{CommandChannel, CommandResponse, PlayerRecord, ServerCommand, StdinSink};
use crate::config::ServerConfig;
use crate::decoder::LineDecoder;
use crate::error::Result;
use crate::event::EventType;
use crate::game::{HealthMonitor, HealthReport, SharedState, StatsHandler};
use crate::listener::{EventListener, HandlerTable, ListenerStats};
use crate::plugin::{self, PluginContext};
use crate::stats::{GameState, JsonLinesArchive, MapInfo, PlayerSnapshot, RoundArchive, RoundSnapshot, TeamColor, TeamSnapshot};
use crate::supervisor::{ProcessSpawner, ProcessState, ProcessSupervisor, Signal, SpawnLock};
use crate::tailer::LogTailer;

/// Point-in-time view of a server for the outward query surface
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub name: String,
    pub state: ProcessState,
    pub pid: Option<u32>,
    pub spawn_count: u64,
    pub current_map: Option<MapInfo>,
    pub player_count: usize,
    pub health: HealthReport,
    pub listeners: Vec<(String, ListenerStats)>,
}

struct Workers {
    tailer: Option<JoinHandle<()>>,
    rotation: Option<RotationTask>,
}

pub struct Server {
    config: ServerConfig,
    supervisor: ProcessSupervisor,
    tailer: LogTailer,
    channel: Arc<CommandChannel>,
    state: SharedState,
    health: HealthMonitor,
    listeners: Mutex<Vec<EventListener>>,
    workers: Mutex<Workers>,
}

impl Server {
    /// Wire a server together. Must run inside a tokio runtime; listener
    /// workers start immediately, the process does not.
    pub async fn new(config: ServerConfig, spawner: Arc<dyn ProcessSpawner>, spawn_lock: SpawnLock) -> Result<Self> {
        let name = config.name.clone();
        let state: SharedState = Arc::new(RwLock::new(GameState::new(
            config.mode,
            config.game.clone(),
            Utc::now(),
        )));

        let sink = StdinSink::new(&name);
        let channel = Arc::new(CommandChannel::new(&name, Arc::new(sink.clone()), config.timeouts));
        channel.set_logging_enabled(config.events_enabled);

        let mut stats = StatsHandler::new(&name, Arc::clone(&state));
        if let Some(path) = &config.archive_path {
            let archive: Arc<dyn RoundArchive> = Arc::new(JsonLinesArchive::new(path));
            stats = stats.with_archive(archive);
        }
        let health = HealthMonitor::new(&name, config.health_window, config.junk_alarm_ratio);

        let mut listeners = vec![
            EventListener::spawn(format!("{name}/stats"), stats.into_table()),
            EventListener::spawn(
                format!("{name}/commands"),
                HandlerTable::new().fallback(Arc::new(channel.correlator())),
            ),
            EventListener::spawn(format!("{name}/health"), health.table()),
        ];

        let ctx = PluginContext {
            server: name.clone(),
            channel: Arc::clone(&channel),
            state: Arc::clone(&state),
        };
        for plugin_name in &config.plugins {
            let table = plugin::build(plugin_name, &ctx)?;
            listeners.push(EventListener::spawn(format!("{name}/{plugin_name}"), table));
        }

        let tailer = LogTailer::new(&name, LineDecoder::default(), config.poll_interval);
        for listener in &listeners {
            tailer.add_listener(listener.sender()).await;
        }

        let supervisor = ProcessSupervisor::builder(&name, config.command.clone(), spawner)
            .spawn_lock(spawn_lock)
            .stdin_sink(sink)
            .options(config.supervisor)
            .hook(Arc::new(OpenLogHook {
                tailer: tailer.clone(),
                log_dir: config.log_dir.clone(),
                pattern: config.log_file_pattern.clone(),
                replay_existing_log: config.replay_existing_log,
            }))
            .hook(Arc::new(ExitEventHook {
                stats: listeners[0].sender(),
            }))
            .build();

        Ok(Self {
            config,
            supervisor,
            tailer,
            channel,
            state,
            health,
            listeners: Mutex::new(listeners),
            workers: Mutex::new(Workers {
                tailer: None,
                rotation: None,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn tailer(&self) -> &LogTailer {
        &self.tailer
    }

    pub fn channel(&self) -> &Arc<CommandChannel> {
        &self.channel
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Spawn the process and start the tail and rotation workers.
    pub async fn start(&self) -> Result<()> {
        self.supervisor.start().await?;

        let mut workers = self.workers.lock().await;
        if workers.tailer.as_ref().map_or(true, |h| h.is_finished()) {
            workers.tailer = Some(self.tailer.spawn());
        }
        if workers.rotation.is_none() {
            workers.rotation = Some(RotationTask::spawn(
                self.tailer.clone(),
                self.config.log_dir.clone(),
                self.config.log_file_pattern.clone(),
                self.config.rotation_check_interval,
            ));
        }
        info!(server = %self.name(), "Server started");
        Ok(())
    }

    /// Stop the process. The tailer keeps running so the last lines the
    /// process wrote are still picked up.
    pub async fn stop(&self) -> Result<()> {
        self.supervisor.stop(Signal::SIGTERM).await?;
        info!(server = %self.name(), "Server stopped");
        Ok(())
    }

    pub async fn restart(&self) -> Result<()> {
        self.supervisor.restart().await?;
        Ok(())
    }

    /// Stop the process and every worker. The server cannot be restarted
    /// afterwards.
    pub async fn shutdown(&self) -> Result<()> {
        let stopped = self.supervisor.shutdown().await;

        self.tailer.stop();
        let mut workers = self.workers.lock().await;
        if let Some(rotation) = workers.rotation.take() {
            rotation.stop();
        }
        if let Some(handle) = workers.tailer.take() {
            if let Err(e) = handle.await {
                warn!(server = %self.name(), "Tailer ended abnormally: {}", e);
            }
        }
        for listener in self.listeners.lock().await.drain(..) {
            listener.join().await;
        }
        stopped?;
        Ok(())
    }

    /// Wait until every listener has drained its queue.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        for listener in self.listeners.lock().await.iter() {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            if !listener.wait_idle(left).await {
                return false;
            }
        }
        true
    }

    pub async fn current_map(&self) -> Option<MapInfo> {
        self.state.read().await.current_map().cloned()
    }

    pub async fn player(&self, name: &str) -> Result<PlayerSnapshot> {
        self.state.read().await.player(name)
    }

    pub async fn players(&self) -> Vec<PlayerSnapshot> {
        self.state.read().await.players()
    }

    pub async fn team(&self, color: TeamColor) -> Result<TeamSnapshot> {
        self.state.read().await.team(color)
    }

    pub async fn current_round(&self) -> RoundSnapshot {
        self.state.read().await.round_snapshot(Utc::now())
    }

    /// Up to `count` remembered rounds, newest first.
    pub async fn remembered_rounds(&self, count: usize) -> Vec<RoundSnapshot> {
        self.state.read().await.remembered(count)
    }

    /// Send a raw command line, optionally waiting for a response of type
    /// `expect`.
    pub async fn send_command(&self, line: &str, expect: Option<EventType>) -> Result<CommandResponse> {
        self.channel.send(line, expect).await
    }

    pub async fn execute(&self, command: &ServerCommand) -> Result<CommandResponse> {
        self.channel.execute(command).await
    }

    /// Ask the server itself who is connected.
    pub async fn list_players(&self) -> Result<Vec<PlayerRecord>> {
        self.channel.players().await
    }

    pub async fn status(&self) -> ServerStatus {
        let (current_map, player_count) = {
            let state = self.state.read().await;
            (state.current_map().cloned(), state.player_count())
        };
        let listeners = self
            .listeners
            .lock()
            .await
            .iter()
            .map(|l| (l.name().to_string(), l.stats()))
            .collect();
        ServerStatus {
            name: self.name().to_string(),
            state: self.supervisor.state(),
            pid: self.supervisor.pid(),
            spawn_count: self.supervisor.spawn_count(),
            current_map,
            player_count,
            health: self.health.report().await,
            listeners,
        }
    }
}

#[cfg(test)]
mod tests;
