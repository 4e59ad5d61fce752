//! Process lifecycle: spawn, watch, respawn, stop
//!
//! States run `Stopped -> Spawning -> Running -> (exit) -> Spawning -> ...
//! -> Stopping -> Stopped`. A liveness task polls the child on its own timer
//! and is the only path that respawns. `stop` clears the keep-running flag
//! before signalling, so a concurrent liveness check never brings the
//! process back.

pub mod command;
pub mod error;
pub mod mock;
pub mod policy;
pub mod spawner;

pub use command::{ProcessCommand, ProcessCommandBuilder};
pub use error::ProcessError;
pub use mock::{MockHandle, MockSpawner};
pub use nix::sys::signal::Signal;
pub use policy::{CrashTracker, RestartDecision, RestartPolicy};
pub use spawner::{ExitStatus, ProcessSpawner, SupervisedChild, TokioSpawner};

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::command::StdinSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Stopped,
    Spawning,
    Running,
    Stopping,
}

/// Serializes spawning across every process sharing it
pub type SpawnLock = Arc<Mutex<()>>;

pub fn spawn_lock() -> SpawnLock {
    Arc::new(Mutex::new(()))
}

#[derive(Debug, Clone, Copy)]
pub struct SpawnInfo {
    /// 1 for the first spawn of this supervisor
    pub attempt: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct ExitInfo {
    pub pid: Option<u32>,
    pub status: ExitStatus,
    pub uptime: Duration,
    /// The exit followed a stop request.
    pub requested: bool,
}

/// Callbacks around each process incarnation
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    /// Runs under the spawn lock right before spawning. An error aborts the
    /// spawn.
    async fn pre_spawn(&self, _info: &SpawnInfo) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs once per observed exit, before any respawn.
    async fn post_exit(&self, _info: &ExitInfo) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SupervisorOptions {
    pub liveness_interval: Duration,
    /// How long `stop` waits after the signal before escalating to SIGKILL
    pub stop_timeout: Duration,
    pub restart: RestartPolicy,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            liveness_interval: Duration::from_millis(500),
            stop_timeout: Duration::from_secs(5),
            restart: RestartPolicy::default(),
        }
    }
}

struct RunningChild {
    child: Box<dyn SupervisedChild>,
    pid: Option<u32>,
    started: Instant,
}

struct Inner {
    name: String,
    command: ProcessCommand,
    spawner: Arc<dyn ProcessSpawner>,
    spawn_lock: SpawnLock,
    hooks: Vec<Arc<dyn LifecycleHook>>,
    stdin: Option<StdinSink>,
    options: SupervisorOptions,
    state: watch::Sender<ProcessState>,
    keep_running: AtomicBool,
    child: Mutex<Option<RunningChild>>,
    pid: AtomicU32,
    spawn_count: AtomicU64,
    exit_count: AtomicU64,
    crashes: Mutex<CrashTracker>,
    liveness: Mutex<Option<JoinHandle<()>>>,
}

pub struct SupervisorBuilder {
    name: String,
    command: ProcessCommand,
    spawner: Arc<dyn ProcessSpawner>,
    spawn_lock: Option<SpawnLock>,
    hooks: Vec<Arc<dyn LifecycleHook>>,
    stdin: Option<StdinSink>,
    options: SupervisorOptions,
}

impl SupervisorBuilder {
    pub fn spawn_lock(mut self, lock: SpawnLock) -> Self {
        self.spawn_lock = Some(lock);
        self
    }

    pub fn hook(mut self, hook: Arc<dyn LifecycleHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Attach each new child's stdin to `sink`.
    pub fn stdin_sink(mut self, sink: StdinSink) -> Self {
        self.stdin = Some(sink);
        self
    }

    pub fn options(mut self, options: SupervisorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> ProcessSupervisor {
        let (state, _) = watch::channel(ProcessState::Stopped);
        ProcessSupervisor {
            inner: Arc::new(Inner {
                name: self.name,
                command: self.command,
                spawner: self.spawner,
                spawn_lock: self.spawn_lock.unwrap_or_else(spawn_lock),
                hooks: self.hooks,
                stdin: self.stdin,
                options: self.options,
                state,
                keep_running: AtomicBool::new(false),
                child: Mutex::new(None),
                pid: AtomicU32::new(0),
                spawn_count: AtomicU64::new(0),
                exit_count: AtomicU64::new(0),
                crashes: Mutex::new(CrashTracker::default()),
                liveness: Mutex::new(None),
            }),
        }
    }
}

#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
}

impl ProcessSupervisor {
    pub fn builder(
        name: impl Into<String>,
        command: ProcessCommand,
        spawner: Arc<dyn ProcessSpawner>,
    ) -> SupervisorBuilder {
        SupervisorBuilder {
            name: name.into(),
            command,
            spawner,
            spawn_lock: None,
            hooks: Vec::new(),
            stdin: None,
            options: SupervisorOptions::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn command(&self) -> &ProcessCommand {
        &self.inner.command
    }

    pub fn state(&self) -> ProcessState {
        *self.inner.state.borrow()
    }

    pub fn pid(&self) -> Option<u32> {
        match self.inner.pid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    pub fn spawn_count(&self) -> u64 {
        self.inner.spawn_count.load(Ordering::SeqCst)
    }

    pub fn exit_count(&self) -> u64 {
        self.inner.exit_count.load(Ordering::SeqCst)
    }

    pub fn keep_running(&self) -> bool {
        self.inner.keep_running.load(Ordering::SeqCst)
    }

    /// Wait until the supervisor reaches `state`, or `timeout` passes.
    pub async fn wait_for_state(&self, state: ProcessState, timeout: Duration) -> bool {
        let mut rx = self.inner.state.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|s| *s == state))
            .await
            .is_ok_and(|r| r.is_ok())
    }

    fn set_state(&self, state: ProcessState) {
        self.inner.state.send_replace(state);
    }

    /// Spawn the process and start watching it.
    ///
    /// A failure here (missing executable, failing pre-spawn hook) is
    /// returned to the caller and leaves the supervisor stopped.
    pub async fn start(&self) -> Result<(), ProcessError> {
        self.inner.keep_running.store(true, Ordering::SeqCst);
        *self.inner.crashes.lock().await = CrashTracker::default();
        if let Err(e) = self.spawn_child().await {
            self.inner.keep_running.store(false, Ordering::SeqCst);
            return Err(e);
        }
        self.ensure_liveness_task().await;
        Ok(())
    }

    async fn spawn_child(&self) -> Result<(), ProcessError> {
        let inner = &self.inner;
        let _lock = inner.spawn_lock.lock().await;
        if !inner.keep_running.load(Ordering::SeqCst) {
            debug!(server = %inner.name, "Stop requested, not spawning");
            return Ok(());
        }
        if inner.child.lock().await.is_some() {
            debug!(server = %inner.name, "Already running, not spawning");
            return Ok(());
        }
        self.set_state(ProcessState::Spawning);

        let info = SpawnInfo {
            attempt: inner.spawn_count.load(Ordering::SeqCst) + 1,
        };
        for hook in &inner.hooks {
            if let Err(e) = hook.pre_spawn(&info).await {
                self.set_state(ProcessState::Stopped);
                return Err(ProcessError::Hook(format!("{e:#}")));
            }
        }

        let mut child = match inner.spawner.spawn(&inner.command).await {
            Ok(child) => child,
            Err(e) => {
                error!(server = %inner.name, "Failed to spawn {}: {}", inner.command, e);
                self.set_state(ProcessState::Stopped);
                return Err(e);
            }
        };
        if let (Some(sink), Some(stdin)) = (&inner.stdin, child.take_stdin()) {
            sink.attach(stdin).await;
        }

        let pid = child.id();
        *inner.child.lock().await = Some(RunningChild {
            child,
            pid,
            started: Instant::now(),
        });
        inner.pid.store(pid.unwrap_or(0), Ordering::SeqCst);
        inner.spawn_count.fetch_add(1, Ordering::SeqCst);
        self.set_state(ProcessState::Running);
        info!(server = %inner.name, pid = ?pid, attempt = info.attempt, "Spawned {}", inner.command);
        Ok(())
    }

    async fn ensure_liveness_task(&self) {
        let mut slot = self.inner.liveness.lock().await;
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let supervisor = self.clone();
        *slot = Some(tokio::spawn(async move {
            let interval = supervisor.inner.options.liveness_interval;
            loop {
                tokio::time::sleep(interval).await;
                if let Err(e) = supervisor.poll_liveness().await {
                    warn!(server = %supervisor.inner.name, "Liveness check failed: {}", e);
                }
                // decide under the slot lock: a concurrent start sees either
                // a live task or an empty slot
                let mut slot = supervisor.inner.liveness.lock().await;
                if !supervisor.keep_running() && supervisor.inner.child.lock().await.is_none() {
                    slot.take();
                    break;
                }
            }
            debug!(server = %supervisor.inner.name, "Liveness task finished");
        }));
    }

    /// One liveness check. Returns true when an exit was observed (and
    /// handled, including any respawn).
    pub async fn poll_liveness(&self) -> Result<bool, ProcessError> {
        let exited = {
            let mut slot = self.inner.child.lock().await;
            let Some(running) = slot.as_mut() else {
                return Ok(false);
            };
            match running.child.try_wait()? {
                Some(status) => slot.take().map(|running| (running, status)),
                None => None,
            }
        };
        let Some((running, status)) = exited else {
            return Ok(false);
        };
        self.handle_exit(running, status).await;
        Ok(true)
    }

    async fn handle_exit(&self, running: RunningChild, status: ExitStatus) {
        let inner = &self.inner;
        inner.pid.store(0, Ordering::SeqCst);
        inner.exit_count.fetch_add(1, Ordering::SeqCst);
        if let Some(sink) = &inner.stdin {
            sink.detach().await;
        }

        let keep_running = inner.keep_running.load(Ordering::SeqCst);
        let info = ExitInfo {
            pid: running.pid,
            status,
            uptime: running.started.elapsed(),
            requested: !keep_running,
        };
        if info.requested {
            info!(server = %inner.name, pid = ?info.pid, "Process exited ({:?})", status);
        } else {
            warn!(
                server = %inner.name,
                pid = ?info.pid,
                "Process exited unexpectedly ({:?}) after {:?}",
                status,
                info.uptime
            );
        }

        for hook in &inner.hooks {
            if let Err(e) = hook.post_exit(&info).await {
                warn!(server = %inner.name, "Exit hook failed: {:#}", e);
            }
        }

        if !keep_running {
            self.set_state(ProcessState::Stopped);
            return;
        }

        let decision = {
            let mut crashes = inner.crashes.lock().await;
            inner.options.restart.decide(info.uptime, &mut crashes)
        };
        match decision {
            RestartDecision::Immediate => {}
            RestartDecision::After(delay) => {
                warn!(server = %inner.name, "Crashed quickly, respawning in {:?}", delay);
                self.set_state(ProcessState::Spawning);
                tokio::time::sleep(delay).await;
                if !self.keep_running() {
                    debug!(server = %inner.name, "Stop requested during backoff");
                    self.set_state(ProcessState::Stopped);
                    return;
                }
            }
            RestartDecision::GiveUp { fast_crashes } => {
                error!(
                    server = %inner.name,
                    "Giving up after {} fast crashes in a row; start it again manually",
                    fast_crashes
                );
                inner.keep_running.store(false, Ordering::SeqCst);
                self.set_state(ProcessState::Stopped);
                return;
            }
        }

        info!(server = %inner.name, "Respawning");
        if let Err(e) = self.spawn_child().await {
            error!(server = %inner.name, "Respawn failed: {}", e);
            inner.keep_running.store(false, Ordering::SeqCst);
            self.set_state(ProcessState::Stopped);
        }
    }

    /// Stop the process with `signal` and wait for it to exit.
    ///
    /// A signal that cannot be delivered (the process is already gone) is
    /// logged, not returned. A process that outlives `stop_timeout` is
    /// killed.
    pub async fn stop(&self, signal: Signal) -> Result<(), ProcessError> {
        self.inner.keep_running.store(false, Ordering::SeqCst);

        {
            // waits out a spawn in flight so its child is signalled too
            let _spawning = self.inner.spawn_lock.lock().await;
            let mut slot = self.inner.child.lock().await;
            let Some(running) = slot.as_mut() else {
                self.set_state(ProcessState::Stopped);
                return Ok(());
            };
            self.set_state(ProcessState::Stopping);
            match running.child.signal(signal) {
                Ok(()) => info!(server = %self.inner.name, pid = ?running.pid, "Sent {}", signal),
                Err(e) => warn!(server = %self.inner.name, "Could not signal process: {}", e),
            }
        }

        if self.reap_within(self.inner.options.stop_timeout).await? {
            return Ok(());
        }

        warn!(
            server = %self.inner.name,
            "Process ignored {} for {:?}, killing it",
            signal,
            self.inner.options.stop_timeout
        );
        if let Some(running) = self.inner.child.lock().await.as_mut() {
            if let Err(e) = running.child.signal(Signal::SIGKILL) {
                warn!(server = %self.inner.name, "Could not kill process: {}", e);
            }
        }
        self.reap_within(self.inner.options.stop_timeout).await?;
        Ok(())
    }

    /// Poll until the child has been reaped; false on timeout.
    async fn reap_within(&self, timeout: Duration) -> Result<bool, ProcessError> {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll_liveness().await?;
            if self.inner.child.lock().await.is_none() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// `stop` then `start`, with no delay in between.
    pub async fn restart(&self) -> Result<(), ProcessError> {
        self.stop(Signal::SIGTERM).await?;
        self.start().await
    }

    /// Stop the process and the liveness task.
    pub async fn shutdown(&self) -> Result<(), ProcessError> {
        let result = self.stop(Signal::SIGTERM).await;
        if let Some(handle) = self.inner.liveness.lock().await.take() {
            handle.abort();
        }
        result
    }
}
