//! Every configured server, sharing one spawn lock

use std::sync::Arc;
use tracing::{error, info};

use crate::config::{ServerConfig, StackConfig};
use crate::error::{Result, StackError};
use crate::server::{Server, ServerStatus};
use crate::supervisor::{spawn_lock, ProcessSpawner, SpawnLock};

pub struct Stack {
    servers: Vec<Arc<Server>>,
    spawn_lock: SpawnLock,
}

impl Stack {
    /// Validate `config` and build every server, spawning nothing.
    pub async fn from_config(config: &StackConfig, spawner: Arc<dyn ProcessSpawner>) -> Result<Self> {
        Self::from_servers(config.resolve()?, spawner).await
    }

    pub async fn from_servers(configs: Vec<ServerConfig>, spawner: Arc<dyn ProcessSpawner>) -> Result<Self> {
        let lock = spawn_lock();
        let mut servers = Vec::with_capacity(configs.len());
        for config in configs {
            let server = Server::new(config, Arc::clone(&spawner), Arc::clone(&lock)).await?;
            servers.push(Arc::new(server));
        }
        Ok(Self {
            servers,
            spawn_lock: lock,
        })
    }

    pub fn spawn_lock(&self) -> &SpawnLock {
        &self.spawn_lock
    }

    pub fn servers(&self) -> &[Arc<Server>] {
        &self.servers
    }

    pub fn names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.name()).collect()
    }

    pub fn get(&self, name: &str) -> Result<&Arc<Server>> {
        self.servers
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| StackError::ServerNotFound(name.to_string()))
    }

    /// Start the named servers, or all of them when `names` is empty.
    ///
    /// Stops at the first server that cannot start; servers started before
    /// it keep running.
    pub async fn start(&self, names: &[String]) -> Result<()> {
        let selected: Vec<&Arc<Server>> = if names.is_empty() {
            self.servers.iter().collect()
        } else {
            names.iter().map(|n| self.get(n)).collect::<Result<_>>()?
        };
        for server in selected {
            if let Err(e) = server.start().await {
                error!(server = %server.name(), "Failed to start: {}", e);
                return Err(e);
            }
        }
        info!("Stack running with {} server(s)", self.servers.len());
        Ok(())
    }

    pub async fn start_all(&self) -> Result<()> {
        self.start(&[]).await
    }

    /// Stop every process; keeps going past failures and returns the first.
    pub async fn stop_all(&self) -> Result<()> {
        let mut first = None;
        for server in &self.servers {
            if let Err(e) = server.stop().await {
                error!(server = %server.name(), "Failed to stop: {}", e);
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Stop every process and tear down every worker.
    pub async fn shutdown(&self) -> Result<()> {
        let mut first = None;
        for server in &self.servers {
            if let Err(e) = server.shutdown().await {
                error!(server = %server.name(), "Failed to shut down: {}", e);
                first.get_or_insert(e);
            }
        }
        info!("Stack shut down");
        first.map_or(Ok(()), Err)
    }

    pub async fn statuses(&self) -> Vec<ServerStatus> {
        let mut statuses = Vec::with_capacity(self.servers.len());
        for server in &self.servers {
            statuses.push(server.status().await);
        }
        statuses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::{MockSpawner, ProcessCommand, ProcessState};
    use tempfile::TempDir;

    fn configs(dir: &TempDir, names: &[&str]) -> Vec<ServerConfig> {
        names
            .iter()
            .map(|name| {
                ServerConfig::new(
                    *name,
                    ProcessCommand::parse("zserv").unwrap(),
                    dir.path().join(name),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_start_selected_and_lookup() {
        let dir = TempDir::new().unwrap();
        let spawner = MockSpawner::new();
        let stack = Stack::from_servers(configs(&dir, &["ctf1", "duel"]), Arc::new(spawner.clone()))
            .await
            .unwrap();

        stack.start(&["duel".to_string()]).await.unwrap();
        assert_eq!(spawner.spawn_count(), 1);
        assert_eq!(stack.get("duel").unwrap().supervisor().state(), ProcessState::Running);
        assert_eq!(stack.get("ctf1").unwrap().supervisor().state(), ProcessState::Stopped);
        assert!(matches!(stack.get("coop"), Err(StackError::ServerNotFound(_))));
        assert!(matches!(
            stack.start(&["coop".to_string()]).await,
            Err(StackError::ServerNotFound(_))
        ));

        stack.shutdown().await.unwrap();
        assert!(stack
            .statuses()
            .await
            .iter()
            .all(|s| s.state == ProcessState::Stopped));
    }

    #[tokio::test]
    async fn test_start_all_stops_at_first_failure() {
        let dir = TempDir::new().unwrap();
        let spawner = MockSpawner::new();
        spawner.fail_next_spawn();
        let stack = Stack::from_servers(configs(&dir, &["ctf1", "duel"]), Arc::new(spawner.clone()))
            .await
            .unwrap();

        let err = stack.start_all().await.unwrap_err();
        assert!(matches!(err, StackError::Process(_)));
        assert_eq!(spawner.spawn_count(), 0);
        assert_eq!(stack.names(), vec!["ctf1", "duel"]);
    }
}
