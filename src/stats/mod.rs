//! Cascading statistics: player -> team -> round
//!
//! Every counter lives in a node of the current round's [`StatArena`]. A
//! player's node points at its team's node (team modes) or at the round
//! root; applying an operation to a player therefore updates the team and
//! round totals in the same call. A map change replaces the round, and with
//! it the arena, after snapshotting the finished one.

pub mod archive;
pub mod arena;
pub mod counters;
pub mod mode;
pub mod player;
pub mod round;
pub mod state;
pub mod team;

pub use archive::{JsonLinesArchive, RoundArchive};
pub use arena::{NodeId, NodeKind, StatArena};
pub use counters::{Counters, StatOp};
pub use mode::{rules_for, GameMode, HasFlagStats, HasTeams, ModeRules};
pub use player::{PairedTally, Player};
pub use round::{MapInfo, PlayerSnapshot, Round, RoundSnapshot, TeamSnapshot};
pub use state::{GameSettings, GameState, ENVIRONMENT};
pub use team::{Team, TeamColor};
