use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::StackConfig;
use crate::error::{Result, StackError};

/// `<config dir>/zstack/stack.toml` for the current user
pub fn default_config_path() -> Result<PathBuf> {
    ProjectDirs::from("org", "zstack", "zstack")
        .map(|dirs| dirs.config_dir().join("stack.toml"))
        .ok_or_else(|| StackError::Config("could not determine home directory".to_string()))
}

pub fn load_from_str(content: &str) -> Result<StackConfig> {
    Ok(toml::from_str(content)?)
}

/// Read the configuration at `path`, or at the default location.
pub async fn load(path: Option<&Path>) -> Result<StackConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };
    debug!("Loading configuration from {}", path.display());

    let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
        StackError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    load_from_str(&content)
}
