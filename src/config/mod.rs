//! User configuration
//!
//! A single TOML file, by default `~/.config/pool/config.toml`. Every
//! section is optional.

pub mod schema;

pub use schema::{Config, ToolsConfig};

use crate::error::{PoolError, PoolResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pool")
            .join("config.toml")
    }

    /// Load configuration, falling back to defaults if absent
    pub fn load(&self) -> PoolResult<Config> {
        if !self.config_path.exists() {
            debug!("no config at {}, using defaults", self.config_path.display());
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(&self, path: &Path) -> PoolResult<Config> {
        let content = fs::read_to_string(path)
            .map_err(|e| PoolError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| PoolError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Write `config` as TOML, replacing the file atomically
    pub fn save(&self, config: &Config) -> PoolResult<()> {
        let dir = match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| PoolError::ConfigDirCreate {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let content = toml::to_string_pretty(config)?;
        let write_error =
            |e: std::io::Error| PoolError::io(format!("writing {}", self.config_path.display()), e);
        let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
        staged.write_all(content.as_bytes()).map_err(write_error)?;
        staged
            .persist(&self.config_path)
            .map_err(|e| write_error(e.error))?;

        info!("saved config to {}", self.config_path.display());
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
