//! CLI commands

pub mod ask;
pub mod classify;
pub mod ingest;
pub mod init;
pub mod stats;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use vidrecall::config::{self, EngineConfig};
use vidrecall::storage::SqliteObservationStore;

/// Options shared by every command
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Directory holding `.vidrecall/`
    pub project: PathBuf,
    /// Explicit config file, overriding `.vidrecall/config.toml`
    pub config_file: Option<PathBuf>,
}

impl Workspace {
    /// Load the config, anchoring a relative store path at the project
    pub fn config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config_file {
            Some(path) => config::load_file(path)?,
            None => config::load(&self.project)?,
        };
        config.validate()?;

        let store_path = config.store.resolved_path();
        if store_path.is_relative() {
            config.store.path = self.project.join(store_path).to_string_lossy().into_owned();
        }
        Ok(config)
    }

    pub fn open_store(&self, config: &EngineConfig) -> Result<SqliteObservationStore> {
        SqliteObservationStore::open(&config.store)
            .with_context(|| format!("Failed to open observation store at {}", config.store.path))
    }

    pub fn project(&self) -> &Path {
        &self.project
    }
}
