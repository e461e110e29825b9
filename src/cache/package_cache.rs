use crate::backend::ArtifactReader;
use crate::error::{PoolError, PoolResult};
use crate::fsutil::hardlink_or_copy;
use crate::package::{cache_filename, is_binary_artifact, parse_package_filename};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// The pool's store of built binary packages
pub struct PackageCache {
    path: PathBuf,
    filenames: BTreeMap<(String, String), String>,
    namerefs: HashMap<String, usize>,
    reader: Arc<dyn ArtifactReader>,
}

impl fmt::Debug for PackageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageCache")
            .field("path", &self.path)
            .field("packages", &self.filenames.len())
            .finish()
    }
}

impl PackageCache {
    /// Open the cache at `path`, indexing the packages already in it
    pub fn open(path: impl Into<PathBuf>, reader: Arc<dyn ArtifactReader>) -> PoolResult<Self> {
        let path = path.into();
        let mut cache = Self {
            path,
            filenames: BTreeMap::new(),
            namerefs: HashMap::new(),
            reader,
        };

        let entries = fs::read_dir(&cache.path)
            .map_err(|e| PoolError::io(format!("reading {}", cache.path.display()), e))?;
        for entry in entries {
            let entry = entry
                .map_err(|e| PoolError::io(format!("reading {}", cache.path.display()), e))?;
            let file_path = entry.path();
            if !file_path.is_file() || !is_binary_artifact(&file_path) {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().into_owned();
            if let Err(e) = cache.register(&filename) {
                warn!("ignoring unrecognized file in package cache: {}", e);
            }
        }

        debug!(
            "opened package cache {} ({} packages)",
            cache.path.display(),
            cache.filenames.len()
        );
        Ok(cache)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn register(&mut self, filename: &str) -> PoolResult<()> {
        let (name, version) = parse_package_filename(filename)?;
        debug!("PackageCache({}): register {}", self.path.display(), filename);
        match self.filenames.entry((name, version)) {
            Entry::Occupied(existing) => {
                warn!(
                    "package cache: {} duplicates {}, ignoring it",
                    filename,
                    existing.get()
                );
            }
            Entry::Vacant(slot) => {
                *self.namerefs.entry(slot.key().0.clone()).or_insert(0) += 1;
                slot.insert(filename.to_string());
            }
        }
        Ok(())
    }

    fn unregister(&mut self, name: &str, version: &str) {
        debug!("PackageCache({}): unregister {}={}", self.path.display(), name, version);
        if self
            .filenames
            .remove(&(name.to_string(), version.to_string()))
            .is_none()
        {
            return;
        }
        if let Some(count) = self.namerefs.get_mut(name) {
            *count -= 1;
            if *count == 0 {
                self.namerefs.remove(name);
            }
        }
    }

    /// Path of a cached package
    pub fn getpath(&self, name: &str, version: &str) -> Option<PathBuf> {
        self.filenames
            .get(&(name.to_string(), version.to_string()))
            .map(|filename| self.path.join(filename))
    }

    /// True if `name` (at `version`, or any version) is cached
    pub fn exists(&self, name: &str, version: Option<&str>) -> bool {
        match version {
            Some(version) => self
                .filenames
                .contains_key(&(name.to_string(), version.to_string())),
            None => self.namerefs.contains_key(name),
        }
    }

    /// Add a binary package, hardlinking when possible.
    ///
    /// Idempotent: a package whose (name, version) is already cached is
    /// left as is. The source file is never modified.
    pub fn add(&mut self, artifact: &Path) -> PoolResult<()> {
        let suffix = artifact
            .extension()
            .and_then(|e| e.to_str())
            .filter(|_| is_binary_artifact(artifact))
            .ok_or_else(|| PoolError::invalid_artifact(artifact, "illegal package suffix"))?
            .to_string();

        let metadata = self.reader.read_metadata(artifact)?;
        if self.exists(&metadata.name, Some(&metadata.version)) {
            return Ok(());
        }

        let filename = cache_filename(
            &metadata.name,
            &metadata.version,
            &metadata.architecture,
            &suffix,
        );
        hardlink_or_copy(artifact, &self.path.join(&filename))?;
        self.register(&filename)
    }

    /// Evict a package. Evicting an uncached package is a no-op.
    pub fn remove(&mut self, name: &str, version: &str) -> PoolResult<()> {
        let Some(path) = self.getpath(name, version) else {
            return Ok(());
        };
        fs::remove_file(&path)
            .map_err(|e| PoolError::io(format!("removing {}", path.display()), e))?;
        self.unregister(name, version);
        Ok(())
    }

    /// All cached (name, version) pairs, sorted
    pub fn list(&self) -> Vec<(String, String)> {
        self.filenames.keys().cloned().collect()
    }

    /// Cached versions of one package
    pub fn versions(&self, name: &str) -> Vec<String> {
        self.filenames
            .keys()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Source package name recorded in a cached package's metadata
    pub fn source_name(&self, name: &str, version: &str) -> PoolResult<Option<String>> {
        match self.getpath(name, version) {
            Some(path) => Ok(self.reader.read_metadata(&path)?.source),
            None => Ok(None),
        }
    }

    #[cfg(test)]
    fn name_count(&self, name: &str) -> usize {
        self.namerefs.get(name).copied().unwrap_or(0)
    }
}
