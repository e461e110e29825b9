//! On-demand builds and harvesting of their output

use super::PoolKernel;
use crate::backend::BuildOptions;
use crate::error::{PoolError, PoolResult};
use crate::fsutil::{copy_into, ensure_dir, remove_tree};
use crate::package::{fmt_package_id, ArtifactKind};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

impl PoolKernel {
    /// Build `name=version` from `source_path` and harvest the results.
    ///
    /// The source tree is always seeked back to its unversioned state, and
    /// the private output directory under `tmp/` is always removed, except
    /// after a failed build in debug mode.
    pub(super) fn build_package(
        &mut self,
        source_path: &Path,
        name: &str,
        version: &str,
        build_source: bool,
    ) -> PoolResult<()> {
        let package = fmt_package_id(name, version);
        let output_dir = tempfile::Builder::new()
            .prefix(&format!("{}-{}.", name, version))
            .keep(true)
            .tempdir_in(&self.paths.tmp)
            .map_err(|e| {
                PoolError::io(
                    format!("creating build directory in {}", self.paths.tmp.display()),
                    e,
                )
            })?
            .path()
            .to_path_buf();

        info!("building {} from {}", package, source_path.display());
        let options = BuildOptions {
            preserve: self.debug,
            build_source,
        };

        let versions = &self.backends.versions;
        let built = versions.seek(source_path, Some(version)).and_then(|()| {
            self.backends
                .builder
                .build(source_path, &self.buildroot, &output_dir, options)
        });
        let reset = versions.seek(source_path, None);

        match built.and_then(|ok| reset.map(|()| ok)) {
            Ok(true) => {}
            Ok(false) => {
                let preserved = self.discard_build_dir(&output_dir)?;
                return Err(PoolError::BuildFailed { package, preserved });
            }
            Err(e) => {
                self.discard_build_dir(&output_dir)?;
                return Err(e);
            }
        }

        let harvested = self.harvest(&output_dir);
        remove_tree(&output_dir)?;
        harvested
    }

    /// Remove a failed build's output, unless debugging.
    ///
    /// Returns the directory when it was kept.
    fn discard_build_dir(&self, output_dir: &Path) -> PoolResult<Option<PathBuf>> {
        if self.debug {
            warn!("preserving build dir {}", output_dir.display());
            return Ok(Some(output_dir.to_path_buf()));
        }
        remove_tree(output_dir)?;
        Ok(None)
    }

    /// Route every file a build produced to its area of the pool
    fn harvest(&mut self, output_dir: &Path) -> PoolResult<()> {
        let mut files: Vec<PathBuf> = fs::read_dir(output_dir)
            .map_err(|e| PoolError::io(format!("reading {}", output_dir.display()), e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        for path in files {
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let area = match ArtifactKind::classify(filename) {
                ArtifactKind::Binary => {
                    self.cache.add(&path)?;
                    continue;
                }
                ArtifactKind::BuildLog => &self.paths.build_logs,
                ArtifactKind::BuildInfo => &self.paths.build_info,
                ArtifactKind::SourceArchive => &self.paths.srcpkgcache,
                ArtifactKind::Other => {
                    debug!("ignoring build output {}", filename);
                    continue;
                }
            };
            ensure_dir(area)?;
            copy_into(&path, area)?;
        }
        Ok(())
    }
}
