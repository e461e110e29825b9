//! A leaf stock's derived on-disk index
//!
//! `index-sources/<reldir>/<package>` lists the versions of a source
//! package, one per line. `index-binaries/<relpath>` is an empty file per
//! binary package observed in the workdir. Both trees are rebuilt from
//! scratch by every sync that runs.

use crate::error::{PoolError, PoolResult};
use crate::fsutil::{ensure_dir, recreate_dir};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug)]
pub struct StockIndex {
    sources_dir: PathBuf,
    binaries_dir: PathBuf,
    sources: BTreeMap<PathBuf, Vec<String>>,
}

impl StockIndex {
    /// Load whatever index is currently on disk
    pub fn load(sources_dir: PathBuf, binaries_dir: PathBuf) -> PoolResult<Self> {
        let mut sources = BTreeMap::new();
        if sources_dir.is_dir() {
            for entry in WalkDir::new(&sources_dir).min_depth(1).sort_by_file_name() {
                let entry = entry.map_err(|e| walk_error(&sources_dir, e))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let content = fs::read_to_string(entry.path()).map_err(|e| {
                    PoolError::io(format!("reading {}", entry.path().display()), e)
                })?;
                let versions = content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect();
                sources.insert(relative(&sources_dir, entry.path()), versions);
            }
        }

        Ok(Self {
            sources_dir,
            binaries_dir,
            sources,
        })
    }

    /// Discard both index trees and start empty
    pub fn reset(&mut self) -> PoolResult<()> {
        recreate_dir(&self.sources_dir)?;
        recreate_dir(&self.binaries_dir)?;
        self.sources.clear();
        Ok(())
    }

    /// Record the versions of `package` built from `rel_dir`
    pub fn record_source(
        &mut self,
        rel_dir: &Path,
        package: &str,
        versions: &[String],
    ) -> PoolResult<()> {
        let dir = self.sources_dir.join(rel_dir);
        ensure_dir(&dir)?;
        let path = dir.join(package);
        let mut content = versions.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(&path, content)
            .map_err(|e| PoolError::io(format!("writing {}", path.display()), e))?;

        self.sources.insert(rel_dir.join(package), versions.to_vec());
        Ok(())
    }

    /// Record a binary package observed at `rel_path`
    pub fn record_binary(&mut self, rel_path: &Path) -> PoolResult<()> {
        let path = self.binaries_dir.join(rel_path);
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        File::create(&path)
            .map(|_| ())
            .map_err(|e| PoolError::io(format!("writing {}", path.display()), e))
    }

    /// `(reldir/package, versions)` for every indexed source package
    pub fn sources(&self) -> impl Iterator<Item = (&Path, &[String])> {
        self.sources
            .iter()
            .map(|(path, versions)| (path.as_path(), versions.as_slice()))
    }

    /// Relative paths of every indexed binary package
    pub fn binaries(&self) -> PoolResult<Vec<PathBuf>> {
        if !self.binaries_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.binaries_dir)
            .min_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| walk_error(&self.binaries_dir, e))?;
            if entry.file_type().is_file() {
                paths.push(relative(&self.binaries_dir, entry.path()));
            }
        }
        Ok(paths)
    }
}

fn relative(base: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(base).unwrap_or(path).to_path_buf()
}

pub(crate) fn walk_error(root: &Path, e: walkdir::Error) -> PoolError {
    let context = format!("walking {}", root.display());
    match e.into_io_error() {
        Some(io) => PoolError::io(context, io),
        None => PoolError::io(context, std::io::Error::other("filesystem loop")),
    }
}
