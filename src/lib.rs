//! Pool - composable Debian package pool
//!
//! A pool keeps a cache of binary packages and a set of registered stocks
//! (source trees, git branches, directories of packages, other pools).
//! Packages are built from source on demand the first time they are
//! requested, and cached packages no stock references can be collected.

pub mod backend;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod kernel;
pub mod package;
pub mod pool;
pub mod proxy;
pub mod stock;
pub mod ui;
pub mod version;

#[cfg(test)]
mod testing;

pub use error::{PoolError, PoolResult};
pub use kernel::{PoolApi, PoolKernel};
pub use pool::{PackageList, Pool};
