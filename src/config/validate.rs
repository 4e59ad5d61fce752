use chrono::format::{Item, StrftimeItems};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use super::{ServerConfig, StackConfig};
use crate::error::{Result, StackError};
use crate::plugin;

fn invalid(server: &str, message: impl std::fmt::Display) -> StackError {
    StackError::Config(format!("server '{server}': {message}"))
}

/// Checks that need the file as written: server set and names.
pub(super) fn validate_stack(config: &StackConfig) -> Result<()> {
    if config.servers.is_empty() {
        return Err(StackError::Config("no [[server]] defined".to_string()));
    }

    let mut seen = HashSet::new();
    for server in &config.servers {
        let name = server.name.trim();
        if name.is_empty() {
            return Err(StackError::Config("server name must not be empty".to_string()));
        }
        if !seen.insert(name) {
            return Err(StackError::Config(format!("duplicate server name '{name}'")));
        }
        if server.command.trim().is_empty() {
            return Err(invalid(name, "command must not be empty"));
        }
    }
    Ok(())
}

/// Checks on one resolved server; nothing has been spawned yet.
pub(super) fn validate_server(server: &ServerConfig) -> Result<()> {
    let name = server.name.as_str();

    if let Some(dir) = &server.command.working_dir {
        if !dir.is_dir() {
            return Err(invalid(name, format!("working_dir {} does not exist", dir.display())));
        }
    }
    let program = Path::new(&server.command.program);
    if program.is_absolute() && !program.exists() {
        return Err(invalid(name, format!("executable {} does not exist", program.display())));
    }

    if server.log_file_pattern.trim().is_empty() {
        return Err(invalid(name, "log_file_pattern must not be empty"));
    }
    if StrftimeItems::new(&server.log_file_pattern).any(|item| matches!(item, Item::Error)) {
        return Err(invalid(
            name,
            format!("log_file_pattern '{}' is not a valid strftime pattern", server.log_file_pattern),
        ));
    }

    let durations: [(&str, Duration); 7] = [
        ("poll_interval", server.poll_interval),
        ("liveness_interval", server.supervisor.liveness_interval),
        ("rotation_check_interval", server.rotation_check_interval),
        ("response_start_timeout", server.timeouts.start),
        ("response_finish_timeout", server.timeouts.finish),
        ("stop_timeout", server.supervisor.stop_timeout),
        ("restart.max_delay", server.supervisor.restart.max_delay),
    ];
    if let Some((key, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
        return Err(invalid(name, format!("{key} must be greater than zero")));
    }

    if server.game.remembered_rounds == 0 {
        return Err(invalid(name, "remembered_rounds must be at least 1"));
    }
    if server.health_window == 0 {
        return Err(invalid(name, "health_window must be at least 1"));
    }
    if !(server.junk_alarm_ratio > 0.0 && server.junk_alarm_ratio <= 1.0) {
        return Err(invalid(name, "junk_alarm_ratio must be in (0, 1]"));
    }

    if let Some(unknown) = server.plugins.iter().find(|p| plugin::find(p).is_none()) {
        return Err(invalid(
            name,
            format!(
                "unknown plugin '{}' (available: {})",
                unknown,
                plugin::names().collect::<Vec<_>>().join(", ")
            ),
        ));
    }
    Ok(())
}
