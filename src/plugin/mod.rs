//! Built-in plugins
//!
//! Plugins are handler tables chosen by name from a fixed registry. Each
//! enabled plugin runs in its own listener, so a plugin that fails or falls
//! behind never holds up game state or command correlation.

mod builtin;

use std::sync::Arc;

use crate::command::CommandChannel;
use crate::error::{Result, StackError};
use crate::game::SharedState;
use crate::listener::HandlerTable;

/// What a plugin may use when building its handlers
#[derive(Clone)]
pub struct PluginContext {
    pub server: String,
    pub channel: Arc<CommandChannel>,
    pub state: SharedState,
}

pub type PluginFactory = fn(&PluginContext) -> HandlerTable;

pub struct PluginSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub build: PluginFactory,
}

pub static REGISTRY: &[PluginSpec] = &[
    PluginSpec {
        name: "junk_alarm",
        description: "log every unrecognised and undecodable line",
        build: builtin::junk_alarm,
    },
    PluginSpec {
        name: "rcon_audit",
        description: "audit trail of remote console access",
        build: builtin::rcon_audit,
    },
    PluginSpec {
        name: "welcome",
        description: "greet players when they join the game",
        build: builtin::welcome,
    },
];

pub fn find(name: &str) -> Option<&'static PluginSpec> {
    REGISTRY.iter().find(|spec| spec.name == name)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|spec| spec.name)
}

pub fn build(name: &str, ctx: &PluginContext) -> Result<HandlerTable> {
    let spec = find(name).ok_or_else(|| {
        StackError::Config(format!(
            "unknown plugin '{}' (available: {})",
            name,
            names().collect::<Vec<_>>().join(", ")
        ))
    })?;
    Ok((spec.build)(ctx))
}

#[cfg(test)]
mod tests;
