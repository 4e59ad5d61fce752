//! # zstack
//!
//! Supervise long-running game servers and turn their rotating text logs
//! into queryable state.
//!
//! ## Usage
//!
//! ```bash
//! zstack run [--config stack.toml] [--server NAME...]
//! zstack check
//! zstack decode gen-20261016.log
//! ```
//!
//! ## Modules
//!
//! - `event` - Typed, timestamped records decoded from log lines
//! - `decoder` - Ordered regex rule table with a `junk` fallback
//! - `tailer` - Polling log tailer with partial-line carry-over and rotation
//! - `listener` - One queue and one worker per consumer of events
//! - `command` - Commands over stdin correlated with their echo in the log
//! - `stats` - Player, team and round counters with cascading rollups
//! - `game` - Listeners that keep game state and decoder health
//! - `plugin` - Built-in plugins, each in its own listener
//! - `supervisor` - Spawn, watch, respawn and stop one process
//! - `server` - One supervised process wired to its log pipeline
//! - `stack` - Every configured server, sharing a spawn lock
//! - `config` - TOML stack configuration
//! - `app` - Logging, signals and the binary's commands
pub mod app;
pub mod command;
pub mod config;
pub mod decoder;
pub mod error;
pub mod event;
pub mod game;
pub mod listener;
pub mod plugin;
pub mod server;
pub mod stack;
pub mod stats;
pub mod supervisor;
pub mod tailer;

pub use error::{Result, StackError};
