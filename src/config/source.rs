use crate::config::ServerOptions;
use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Where the supervisor reads its server options from.
///
/// Implementations must not cache: each start transition takes a fresh
/// snapshot so edits made between restarts are picked up.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn server_options(&self) -> Result<ServerOptions>;
}

/// Re-reads a TOML config file on every call.
///
/// Only the `[server]` table is looked at. An unreadable file or invalid
/// server options fall back to the defaults; a start never fails on config.
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn read_server_section(&self) -> Result<ServerOptions> {
        if !self.path.exists() {
            return Ok(ServerOptions::default());
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        let section: ServerSection = toml::from_str(&content)?;
        section.server.validate()?;
        Ok(section.server)
    }
}

#[derive(Deserialize)]
struct ServerSection {
    #[serde(default)]
    server: ServerOptions,
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn server_options(&self) -> Result<ServerOptions> {
        let options = match self.read_server_section().await {
            Ok(options) => options,
            Err(e) => {
                warn!(
                    "Failed to read server options from {}: {}, using defaults",
                    self.path.display(),
                    e
                );
                ServerOptions::default()
            }
        };
        debug!("Read server options from {}: {:?}", self.path.display(), options);
        Ok(options)
    }
}

/// Fixed options, for embedding hosts that manage configuration themselves
pub struct StaticConfigSource(pub ServerOptions);

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn server_options(&self) -> Result<ServerOptions> {
        Ok(self.0.clone())
    }
}
