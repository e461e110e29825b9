//! On-disk layout of a pool's control directory

use crate::error::{PoolError, PoolResult};
use crate::fsutil::ensure_dir;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the control directory at a pool root
pub const CONTROL_DIR: &str = ".pool";

/// True if `path` is the root of a pool
pub fn is_pool(path: &Path) -> bool {
    path.join(CONTROL_DIR).is_dir()
}

/// Paths inside a pool's control directory
#[derive(Debug, Clone)]
pub struct PoolPaths {
    pub control: PathBuf,
    pub pkgcache: PathBuf,
    pub stocks: PathBuf,
    pub tmp: PathBuf,
    pub build: PathBuf,
    pub build_root: PathBuf,
    pub build_logs: PathBuf,
    pub build_info: PathBuf,
    pub srcpkgcache: PathBuf,
}

impl PoolPaths {
    pub fn new(root: &Path) -> Self {
        let control = root.join(CONTROL_DIR);
        let build = control.join("build");
        Self {
            pkgcache: control.join("pkgcache"),
            stocks: control.join("stocks"),
            tmp: control.join("tmp"),
            build_root: build.join("root"),
            build_logs: build.join("logs"),
            build_info: build.join("buildinfo"),
            srcpkgcache: control.join("srcpkgcache"),
            build,
            control,
        }
    }

    /// (uid, gid) owning the control directory
    pub fn owner(&self) -> PoolResult<(u32, u32)> {
        let meta = fs::metadata(&self.control)
            .map_err(|e| PoolError::io(format!("reading {}", self.control.display()), e))?;
        Ok((meta.uid(), meta.gid()))
    }

    /// Create the control directory for a new pool.
    ///
    /// Derived state is kept out of version control with `.gitignore`
    /// files, so a pool directory can itself be tracked.
    pub fn create(&self, buildroot: &Path) -> PoolResult<()> {
        if self.control.is_dir() {
            let root = self.control.parent().unwrap_or(&self.control);
            return Err(PoolError::AlreadyInitialized(root.to_path_buf()));
        }
        if !buildroot.is_dir() {
            return Err(PoolError::InvalidBuildRoot(buildroot.to_path_buf()));
        }

        debug!("creating pool layout at {}", self.control.display());
        let ignored: [(&Path, &[&str]); 6] = [
            (
                &self.stocks,
                &["index-sources", "index-binaries", "SYNC_HEAD", "checkout"],
            ),
            (&self.pkgcache, &["*.deb", "*.udeb"]),
            (&self.srcpkgcache, &["*.tar.xz", "*.tar.gz", "*.tar.bz2"]),
            (&self.build_logs, &["*.build"]),
            (&self.build_info, &["*.buildinfo"]),
            (&self.control, &["tmp"]),
        ];
        for (dir, patterns) in ignored {
            ensure_dir(dir)?;
            write_gitignore(dir, patterns)?;
        }

        let buildroot = std::path::absolute(buildroot)
            .map_err(|e| PoolError::io(format!("resolving {}", buildroot.display()), e))?;
        std::os::unix::fs::symlink(&buildroot, &self.build_root)
            .map_err(|e| PoolError::io(format!("linking {}", self.build_root.display()), e))
    }
}

fn write_gitignore(dir: &Path, patterns: &[&str]) -> PoolResult<()> {
    let path = dir.join(".gitignore");
    let mut content = patterns.join("\n");
    content.push('\n');
    fs::write(&path, content).map_err(|e| PoolError::io(format!("writing {}", path.display()), e))
}
