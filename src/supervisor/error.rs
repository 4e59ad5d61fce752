#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Empty command line")]
    EmptyCommand,

    #[error("Cannot parse command line {line:?}: {reason}")]
    CommandLine { line: String, reason: String },

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to send {signal} to pid {pid}: {reason}")]
    Signal {
        pid: u32,
        signal: String,
        reason: String,
    },

    #[error("Lifecycle hook failed before spawn: {0}")]
    Hook(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
