//! In-memory spawner for exercising the supervisor without real processes

use async_trait::async_trait;
use nix::sys::signal::Signal;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::DuplexStream;

use super::command::ProcessCommand;
use super::error::ProcessError;
use super::spawner::{ExitStatus, ProcessSpawner, SupervisedChild};
use crate::command::BoxedWriter;

#[derive(Default)]
struct MockChildState {
    exit: Mutex<Option<ExitStatus>>,
    signals: Mutex<Vec<Signal>>,
    stdin: Mutex<Option<DuplexStream>>,
    ignore_signals: bool,
}

/// Test-side view of one spawned mock process
#[derive(Clone)]
pub struct MockHandle {
    pid: u32,
    command: ProcessCommand,
    state: Arc<MockChildState>,
}

impl MockHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command(&self) -> &ProcessCommand {
        &self.command
    }

    /// Make the process exit; the supervisor notices on its next poll.
    pub fn exit(&self, status: ExitStatus) {
        let mut exit = self.state.exit.lock().unwrap();
        if exit.is_none() {
            *exit = Some(status);
        }
    }

    pub fn is_exited(&self) -> bool {
        self.state.exit.lock().unwrap().is_some()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.state.signals.lock().unwrap().clone()
    }

    /// Read end of the process's stdin, once.
    pub fn take_stdin(&self) -> Option<DuplexStream> {
        self.state.stdin.lock().unwrap().take()
    }
}

struct MockChild {
    handle: MockHandle,
    stdin: Option<DuplexStream>,
}

impl SupervisedChild for MockChild {
    fn id(&self) -> Option<u32> {
        (!self.handle.is_exited()).then_some(self.handle.pid)
    }

    fn take_stdin(&mut self) -> Option<BoxedWriter> {
        self.stdin.take().map(|s| Box::new(s) as BoxedWriter)
    }

    fn try_wait(&mut self) -> Result<Option<ExitStatus>, ProcessError> {
        Ok(*self.handle.state.exit.lock().unwrap())
    }

    fn signal(&mut self, signal: Signal) -> Result<(), ProcessError> {
        if self.handle.is_exited() {
            return Err(ProcessError::Signal {
                pid: self.handle.pid,
                signal: signal.to_string(),
                reason: "No such process".to_string(),
            });
        }
        self.handle.state.signals.lock().unwrap().push(signal);
        if signal == Signal::SIGKILL || !self.handle.state.ignore_signals {
            self.handle.exit(ExitStatus::Signal(signal as i32));
        }
        Ok(())
    }
}

#[derive(Default)]
struct MockSpawnerState {
    spawned: Mutex<Vec<MockHandle>>,
    fail_next: AtomicBool,
    ignore_signals: AtomicBool,
    next_pid: AtomicU32,
}

#[derive(Clone, Default)]
pub struct MockSpawner {
    inner: Arc<MockSpawnerState>,
}

impl MockSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next spawn fails as if the executable were missing.
    pub fn fail_next_spawn(&self) {
        self.inner.fail_next.store(true, Ordering::SeqCst);
    }

    /// Processes spawned from now on survive every signal but SIGKILL.
    pub fn ignore_signals(&self, ignore: bool) {
        self.inner.ignore_signals.store(ignore, Ordering::SeqCst);
    }

    pub fn spawned(&self) -> Vec<MockHandle> {
        self.inner.spawned.lock().unwrap().clone()
    }

    pub fn spawn_count(&self) -> usize {
        self.inner.spawned.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<MockHandle> {
        self.inner.spawned.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ProcessSpawner for MockSpawner {
    async fn spawn(&self, command: &ProcessCommand) -> Result<Box<dyn SupervisedChild>, ProcessError> {
        if self.inner.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ProcessError::CommandNotFound(command.program.clone()));
        }

        let (writer, reader) = tokio::io::duplex(64 * 1024);
        let pid = 1000 + self.inner.next_pid.fetch_add(1, Ordering::SeqCst);
        let handle = MockHandle {
            pid,
            command: command.clone(),
            state: Arc::new(MockChildState {
                stdin: Mutex::new(Some(reader)),
                ignore_signals: self.inner.ignore_signals.load(Ordering::SeqCst),
                ..Default::default()
            }),
        };
        self.inner.spawned.lock().unwrap().push(handle.clone());
        Ok(Box::new(MockChild {
            handle,
            stdin: Some(writer),
        }))
    }
}
