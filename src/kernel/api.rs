//! The kernel's fixed public surface
//!
//! Everything a front end can ask of a kernel goes through [`PoolApi`], so
//! the same calls work against an in-process [`PoolKernel`] or a kernel
//! relocated into a worker process behind the proxy client. Every argument
//! and result is a plain serializable value.
//!
//! [`PoolKernel`]: super::PoolKernel

use crate::error::PoolResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub trait PoolApi {
    /// Pool root directory
    fn path(&mut self) -> PoolResult<PathBuf>;

    /// Register a `path[#branch]` stock
    fn register(&mut self, stock: &str) -> PoolResult<()>;

    /// Unregister the stock matching `path[#branch]`
    fn unregister(&mut self, stock: &str) -> PoolResult<()>;

    /// True if `name[=version]` is cached, declared by a stock or known to a subpool
    fn exists(&mut self, package: &str) -> PoolResult<bool>;

    /// `name=version` for every known package, or only the newest version of each
    fn list(&mut self, all_versions: bool) -> PoolResult<Vec<String>>;

    /// Give every version-less identifier its newest known version
    fn resolve(&mut self, packages: &[String]) -> PoolResult<Vec<String>>;

    /// Path of a built package, building it from source if `build` is set
    fn getpath(&mut self, package: &str, build: bool, source: bool)
        -> PoolResult<Option<PathBuf>>;

    /// (name, version) of every build log
    fn build_logs(&mut self) -> PoolResult<Vec<(String, String)>>;

    /// Build log of a source package: the given version, else the newest
    fn getpath_build_log(&mut self, package: &str) -> PoolResult<Option<PathBuf>>;

    /// Source package a cached binary package was built from
    fn binary_to_source(&mut self, package: &str) -> PoolResult<Option<String>>;

    /// Evict cached packages no stock references any more
    fn gc(&mut self, recurse: bool) -> PoolResult<GcReport>;

    /// Synchronize every leaf stock
    fn sync(&mut self) -> PoolResult<()>;

    fn info(&mut self, query: InfoQuery, recursive: bool) -> PoolResult<Vec<PoolInfo>>;

    fn autosync(&mut self) -> PoolResult<bool>;
    fn set_autosync(&mut self, autosync: bool) -> PoolResult<()>;
    fn debug(&mut self) -> PoolResult<bool>;
    fn set_debug(&mut self, debug: bool) -> PoolResult<()>;

    /// (uid, gid) owning the pool's control directory
    fn pool_owner(&mut self) -> PoolResult<(u32, u32)>;
}

/// Outcome of a garbage collection, summed over every collected pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcReport {
    pub whitelisted: usize,
    /// `name=version` of every evicted package
    pub removed: Vec<String>,
}

impl GcReport {
    pub fn merge(&mut self, other: GcReport) {
        self.whitelisted += other.whitelisted;
        self.removed.extend(other.removed);
    }
}

/// What `info` reports on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoQuery {
    #[default]
    Registered,
    Stocks,
    Subpools,
    BuildRoot,
    BuildLogs,
    PkgCache,
    StockSources,
    StockBinaries,
}

/// `info` answer for one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub path: PathBuf,
    pub report: InfoReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoReport {
    Registered {
        stocks: Vec<String>,
        subpools: Vec<PathBuf>,
    },
    /// `link[#branch]` of every leaf stock
    Stocks(Vec<String>),
    Subpools(Vec<PathBuf>),
    BuildRoot(PathBuf),
    /// `name=version` of every build log
    BuildLogs(Vec<String>),
    /// `name=version` of every cached package
    PkgCache(Vec<String>),
    StockSources(Vec<InventoryEntry>),
    StockBinaries(Vec<InventoryEntry>),
}

/// One source or binary package found in a leaf stock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    /// `name=version` for sources, the filename for binaries
    pub package: String,
    pub stock: String,
    /// Directory relative to the stock's workdir
    pub dir: PathBuf,
}
