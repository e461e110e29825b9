//! Subpool stocks: a registered stock whose target is another pool

use super::StockBase;
use crate::backend::Backends;
use crate::error::{PoolError, PoolResult};
use crate::fsutil::canonical;
use crate::kernel::PoolKernel;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct StockPool {
    base: StockBase,
    kernel: PoolKernel,
}

impl fmt::Debug for StockPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StockPool")
            .field("name", &self.base.name)
            .field("link", &self.base.link)
            .finish()
    }
}

impl StockPool {
    /// Open the child kernel behind `base`.
    ///
    /// `recursed` holds every pool root on the current nesting chain; a
    /// target already on it is a cycle.
    pub fn open(
        base: StockBase,
        recursed: &[PathBuf],
        backends: &Backends,
        debug: bool,
    ) -> PoolResult<Self> {
        let target = canonical(&base.link);
        debug!(
            "StockPool(name={}, target={}, recursed={:?})",
            base.name,
            target.display(),
            recursed
        );

        if recursed.contains(&target) {
            return Err(PoolError::CircularDependency {
                path: target,
                recursed: recursed.to_vec(),
            });
        }

        let kernel = PoolKernel::open_nested(&target, recursed.to_vec(), backends.clone(), debug)?;
        Ok(Self { base, kernel })
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn link(&self) -> &Path {
        &self.base.link
    }

    pub fn base(&self) -> &StockBase {
        &self.base
    }

    pub fn kernel(&self) -> &PoolKernel {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut PoolKernel {
        &mut self.kernel
    }
}
