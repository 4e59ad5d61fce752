//! Listeners that turn events into game state

pub mod health;
pub mod stats_handler;

pub use health::{HealthMonitor, HealthReport};
pub use stats_handler::{StatsHandler, STATS_EVENTS};

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::stats::GameState;

/// Game state shared between its single writer and any number of readers
pub type SharedState = Arc<RwLock<GameState>>;
