//! The authoritative game-state listener

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::SharedState;
use crate::decoder::resolve_speaker;
use crate::error::StackError;
use crate::event::{Event, EventCategory, EventType};
use crate::listener::{EventHandler, HandlerTable};
use crate::stats::{RoundArchive, StatOp, TeamColor};

/// Event types that mutate game state
pub const STATS_EVENTS: &[EventType] = &[
    EventType::Connection,
    EventType::Disconnection,
    EventType::GameJoin,
    EventType::AddbotCommand,
    EventType::TeamJoin,
    EventType::GameLeave,
    EventType::Frag,
    EventType::Death,
    EventType::FlagTouch,
    EventType::FlagPick,
    EventType::FlagLoss,
    EventType::FlagReturn,
    EventType::FlagCap,
    EventType::RconGranted,
    EventType::RconDenied,
    EventType::RconAction,
    EventType::MapChange,
    EventType::Message,
    EventType::ProcessExit,
];

/// Applies events to the shared [`GameState`](crate::stats::GameState).
///
/// Exactly one listener per server runs this handler; everything else only
/// reads the state.
pub struct StatsHandler {
    server: String,
    state: SharedState,
    archive: Option<Arc<dyn RoundArchive>>,
}

impl StatsHandler {
    pub fn new(server: impl Into<String>, state: SharedState) -> Self {
        Self {
            server: server.into(),
            state,
            archive: None,
        }
    }

    pub fn with_archive(mut self, archive: Arc<dyn RoundArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Handler table routing every state-changing type here.
    pub fn into_table(self) -> HandlerTable {
        HandlerTable::new().on_all(STATS_EVENTS, Arc::new(self))
    }

    async fn apply(&self, event: &Event) -> crate::error::Result<()> {
        let now = event.timestamp;
        match event.kind {
            EventType::Connection => {
                let port = event.field("port").and_then(|p| p.parse().ok());
                let ip = event.field("ip").map(str::to_string);
                self.state
                    .write()
                    .await
                    .connect(event.require("player")?, ip, port, now);
            }
            EventType::Disconnection => {
                self.state.write().await.disconnect(event.require("player")?)?;
            }
            EventType::GameJoin => {
                self.state
                    .write()
                    .await
                    .join_game(event.require("player")?, now)?;
            }
            EventType::AddbotCommand => {
                let name = event.require("player")?;
                let mut state = self.state.write().await;
                state.connect(name, None, None, now);
                state.join_game(name, now)?;
            }
            EventType::TeamJoin => {
                let color = team_color(event)?;
                self.state
                    .write()
                    .await
                    .join_team(event.require("player")?, color, now)?;
            }
            EventType::GameLeave => {
                self.state.write().await.leave_game(event.require("player")?)?;
            }
            EventType::Frag => {
                self.state.write().await.frag(
                    event.require("fragger")?,
                    event.require("fragged")?,
                    event.require("weapon")?,
                    now,
                )?;
            }
            EventType::Death => {
                let suicide = event.field("suicide") == Some("true");
                self.state.write().await.death(
                    event.require("fragged")?,
                    event.require("weapon")?,
                    suicide,
                    now,
                )?;
            }
            EventType::FlagTouch
            | EventType::FlagPick
            | EventType::FlagLoss
            | EventType::FlagReturn
            | EventType::FlagCap => {
                let color = team_color(event)?;
                let player = event.require("player")?;
                let mut state = self.state.write().await;
                match event.kind {
                    EventType::FlagTouch => state.flag_touch(player, color, now)?,
                    EventType::FlagPick => state.flag_pick(player, color, now)?,
                    EventType::FlagLoss => state.flag_loss(player, color, now)?,
                    EventType::FlagReturn => state.flag_return(player, color, now)?,
                    _ => state.flag_cap(player, color, now)?,
                }
            }
            EventType::RconGranted | EventType::RconDenied | EventType::RconAction => {
                let op = match event.kind {
                    EventType::RconGranted => StatOp::RconAccess,
                    EventType::RconDenied => StatOp::RconDenial,
                    _ => StatOp::RconAction,
                };
                self.state
                    .write()
                    .await
                    .rcon(event.require("player")?, op, now)?;
            }
            EventType::MapChange => self.map_change(event).await?,
            EventType::Message if event.category == EventCategory::Chat => {
                self.chat(event).await?;
            }
            EventType::ProcessExit => {
                let gone = self.state.write().await.process_exit();
                info!(server = %self.server, "Process exited, {} players disconnected", gone);
            }
            _ => {}
        }
        Ok(())
    }

    async fn map_change(&self, event: &Event) -> crate::error::Result<()> {
        let number: u32 = event
            .require("number")?
            .parse()
            .map_err(|_| StackError::Decode(format!("bad map number in {:?}", event.raw_line)))?;
        let name = event.require("name")?;

        let finished = self
            .state
            .write()
            .await
            .map_change(number, name, event.timestamp);

        if let (Some(round), Some(archive)) = (finished, self.archive.as_ref()) {
            if let Err(e) = archive.store(&round).await {
                warn!(server = %self.server, "Failed to archive round: {:#}", e);
            }
        }
        Ok(())
    }

    async fn chat(&self, event: &Event) -> crate::error::Result<()> {
        let mut state = self.state.write().await;
        match resolve_speaker(event, |name| state.is_connected(name)) {
            Some(chat) => {
                let speaker = chat.speaker.to_string();
                debug!(server = %self.server, speaker = %speaker, "chat: {}", chat.text);
                state.message(&speaker)
            }
            None => {
                debug!(
                    server = %self.server,
                    "Dropping chat line with no known speaker: {:?}",
                    event.raw_line
                );
                Ok(())
            }
        }
    }
}

fn team_color(event: &Event) -> crate::error::Result<TeamColor> {
    event
        .require("team")?
        .parse()
        .map_err(StackError::TeamNotFound)
}

#[async_trait]
impl EventHandler for StatsHandler {
    async fn handle(&self, event: &Event) -> Result<()> {
        match self.apply(event).await {
            Ok(()) => Ok(()),
            Err(e @ (StackError::PlayerNotFound(_) | StackError::TeamNotFound(_))) => {
                // guessing would corrupt the stats
                debug!(
                    server = %self.server,
                    event_type = %event.kind,
                    "Dropping event: {}",
                    e
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
