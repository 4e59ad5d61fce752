//! Spawning and signalling real processes

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io::ErrorKind;
use std::process::Stdio;
use tracing::{debug, trace};

use super::command::ProcessCommand;
use super::error::ProcessError;
use crate::command::BoxedWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            ExitStatus::Signal(_) => None,
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        if status.success() {
            ExitStatus::Success
        } else if let Some(sig) = status.signal() {
            ExitStatus::Signal(sig)
        } else {
            ExitStatus::Error(status.code().unwrap_or(-1))
        }
    }
}

/// A running child as seen by the supervisor
pub trait SupervisedChild: Send {
    fn id(&self) -> Option<u32>;

    /// Hand over the write end of the child's stdin, once.
    fn take_stdin(&mut self) -> Option<BoxedWriter>;

    /// Non-blocking exit check.
    fn try_wait(&mut self) -> Result<Option<ExitStatus>, ProcessError>;

    fn signal(&mut self, signal: Signal) -> Result<(), ProcessError>;
}

#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    async fn spawn(&self, command: &ProcessCommand) -> Result<Box<dyn SupervisedChild>, ProcessError>;
}

/// Spawns with tokio, stdin piped, in a fresh process group
pub struct TokioSpawner;

#[async_trait]
impl ProcessSpawner for TokioSpawner {
    async fn spawn(&self, command: &ProcessCommand) -> Result<Box<dyn SupervisedChild>, ProcessError> {
        debug!("Spawning {}", command);

        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }
        // signals go to the whole group so helper processes die with the server
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => ProcessError::CommandNotFound(command.program.clone()),
            _ => ProcessError::Spawn {
                program: command.program.clone(),
                source: e,
            },
        })?;
        Ok(Box::new(TokioChild { child }))
    }
}

struct TokioChild {
    child: tokio::process::Child,
}

impl SupervisedChild for TokioChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn take_stdin(&mut self) -> Option<BoxedWriter> {
        self.child
            .stdin
            .take()
            .map(|stdin| Box::new(stdin) as BoxedWriter)
    }

    fn try_wait(&mut self) -> Result<Option<ExitStatus>, ProcessError> {
        Ok(self.child.try_wait()?.map(ExitStatus::from))
    }

    fn signal(&mut self, sig: Signal) -> Result<(), ProcessError> {
        let pid = self.child.id().ok_or_else(|| ProcessError::Signal {
            pid: 0,
            signal: sig.to_string(),
            reason: "process already reaped".to_string(),
        })?;
        let raw = pid as i32;
        trace!("Sending {} to process group {}", sig, raw);
        signal::kill(Pid::from_raw(-raw), sig)
            .or_else(|_| signal::kill(Pid::from_raw(raw), sig))
            .map_err(|errno| ProcessError::Signal {
                pid,
                signal: sig.to_string(),
                reason: errno.desc().to_string(),
            })
    }
}
