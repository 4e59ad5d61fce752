use std::time::Duration;
use thiserror::Error;

use crate::supervisor::ProcessError;

/// Which half of a command's response window expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutStage {
    /// No event of the expected type arrived.
    Start,
    /// The response started but never ended with an unrelated event.
    Finish,
}

impl std::fmt::Display for TimeoutStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutStage::Start => write!(f, "start"),
            TimeoutStage::Finish => write!(f, "finish"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Server '{0}' is not running")]
    ProcessNotRunning(String),

    #[error("Command '{command}' timed out waiting for the response to {stage} after {waited:?} ({collected} events collected)")]
    CommandTimeout {
        command: String,
        stage: TimeoutStage,
        waited: Duration,
        collected: usize,
    },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    #[error("Team not found: {0}")]
    TeamNotFound(String),

    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Channel closed: {0}")]
    Channel(String),
}

impl StackError {
    /// Exit code the binary reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            StackError::Config(_) | StackError::Toml(_) => 2,
            _ => 1,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, StackError::CommandTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, StackError>;
