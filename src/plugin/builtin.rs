use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::PluginContext;
use crate::command::{CommandChannel, ServerCommand};
use crate::event::{Event, EventType};
use crate::listener::{EventHandler, FnHandler, HandlerTable};

pub(super) fn junk_alarm(ctx: &PluginContext) -> HandlerTable {
    let server = ctx.server.clone();
    let handler = FnHandler(move |event: &Event| -> Result<()> {
        match event.kind {
            EventType::Error => warn!(
                server = %server,
                "Undecodable line {:?}: {}",
                event.field("trace").unwrap_or_default(),
                event.field("message").unwrap_or_default()
            ),
            _ => info!(server = %server, "Unrecognised line {:?}", event.raw_line),
        }
        Ok(())
    });
    HandlerTable::new().on_all(&[EventType::Junk, EventType::Error], Arc::new(handler))
}

pub(super) fn rcon_audit(ctx: &PluginContext) -> HandlerTable {
    let server = ctx.server.clone();
    let handler = FnHandler(move |event: &Event| -> Result<()> {
        let player = event.require("player")?;
        let outcome = match event.kind {
            EventType::RconGranted => "granted",
            EventType::RconDenied => "denied",
            _ => "action",
        };
        info!(
            target: "zstack::audit",
            server = %server,
            player = %player,
            outcome,
            action = event.field("action").unwrap_or_default(),
            "rcon"
        );
        Ok(())
    });
    HandlerTable::new().on_all(
        &[
            EventType::RconGranted,
            EventType::RconDenied,
            EventType::RconAction,
        ],
        Arc::new(handler),
    )
}

struct Welcome {
    channel: Arc<CommandChannel>,
}

#[async_trait]
impl EventHandler for Welcome {
    async fn handle(&self, event: &Event) -> Result<()> {
        let player = event.require("player")?;
        self.channel
            .execute(&ServerCommand::Say(format!("Welcome, {player}!")))
            .await?;
        Ok(())
    }
}

pub(super) fn welcome(ctx: &PluginContext) -> HandlerTable {
    HandlerTable::new().on(
        EventType::GameJoin,
        Arc::new(Welcome {
            channel: Arc::clone(&ctx.channel),
        }),
    )
}
