//! Command-line front end

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};

use crate::config::Config;
use crate::error::{PoolError, PoolResult};
use crate::kernel::is_pool;
use crate::pool::Pool;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the pool directory
pub const POOL_DIR_ENV: &str = "POOL_DIR";

/// Options shared by every command that works on a pool
#[derive(Debug, Clone, Default)]
pub struct PoolOptions {
    /// `--pool`
    pub pool: Option<PathBuf>,
    /// `--debug`
    pub debug: bool,
}

impl PoolOptions {
    /// Directory of the pool to work on.
    ///
    /// `--pool` wins. Otherwise the current directory is used if it is a
    /// pool, then `POOL_DIR`, then `pool.dir` from the config, and finally
    /// the current directory anyway so the error names it.
    pub fn pool_dir(&self, config: &Config) -> PoolResult<PathBuf> {
        let cwd = std::env::current_dir()
            .map_err(|e| PoolError::io("getting current directory", e))?;
        let env = std::env::var_os(POOL_DIR_ENV).map(PathBuf::from);
        Ok(discover_pool_dir(
            self.pool.as_deref(),
            &cwd,
            env.as_deref(),
            config.pool.dir.as_deref(),
        ))
    }

    pub fn open(&self, config: &Config) -> PoolResult<Pool> {
        let dir = self.pool_dir(config)?;
        debug!("using pool at {}", dir.display());
        Pool::open(&dir, self.debug, config)
    }
}

fn discover_pool_dir(
    explicit: Option<&Path>,
    cwd: &Path,
    env: Option<&Path>,
    configured: Option<&Path>,
) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    if is_pool(cwd) {
        return cwd.to_path_buf();
    }
    env.or(configured).unwrap_or(cwd).to_path_buf()
}
