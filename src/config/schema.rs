//! Configuration schema for pool
//!
//! Configuration is stored at `~/.config/pool/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Pool location
    pub pool: PoolConfig,

    /// External tools
    pub tools: ToolsConfig,

    /// Privilege separation
    pub privileges: PrivilegesConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level used when neither -v nor POOL_LOG_LEVEL is given
    pub log_level: String,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_format: "text".to_string(),
        }
    }
}

/// Pool location settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Pool directory used when neither --pool nor POOL_DIR is set
    pub dir: Option<PathBuf>,
}

/// External tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Version control program
    pub git: String,

    /// Source version lister / seeker
    pub verseek: String,

    /// Package builder
    pub builder: String,

    /// Extra arguments passed to the builder before the buildroot
    pub builder_args: Vec<String>,

    /// Binary package metadata extractor
    pub dpkg_deb: String,

    /// Cache extracted package metadata between runs
    pub metadata_cache: bool,

    /// Metadata cache location (default: ~/.cache/pool/debinfo)
    pub metadata_cache_dir: Option<PathBuf>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            verseek: "verseek".to_string(),
            builder: "deckdebuild".to_string(),
            builder_args: vec![],
            dpkg_deb: "dpkg-deb".to_string(),
            metadata_cache: true,
            metadata_cache_dir: None,
        }
    }
}

impl ToolsConfig {
    /// Resolved metadata cache directory
    pub fn metadata_cache_path(&self) -> PathBuf {
        self.metadata_cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pool")
                .join("debinfo")
        })
    }
}

/// Privilege separation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivilegesConfig {
    /// Run the kernel as the pool owner when invoked as root
    pub drop: bool,
}

impl Default for PrivilegesConfig {
    fn default() -> Self {
        Self { drop: true }
    }
}
