//! Leaf stocks: plain directories and version-controlled checkouts

use super::index::{walk_error, StockIndex};
use super::{unescape_branch, StockBase};
use crate::backend::{SourceVersions, Vcs};
use crate::cache::PackageCache;
use crate::error::{PoolError, PoolResult};
use crate::fsutil::{ensure_dir, read_line, remove_file_if_exists, write_line_atomic};
use crate::package::{
    is_binary_artifact, parse_package_filename, source_package_names, SOURCE_DESCRIPTOR,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A non-pool stock and its derived index
pub struct Stock {
    base: StockBase,
    index: StockIndex,
    workdir: Option<PathBuf>,
    vcs: Arc<dyn Vcs>,
    versions: Arc<dyn SourceVersions>,
}

impl fmt::Debug for Stock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stock")
            .field("name", &self.base.name)
            .field("link", &self.base.link)
            .finish()
    }
}

impl Stock {
    pub fn open(
        base: StockBase,
        vcs: Arc<dyn Vcs>,
        versions: Arc<dyn SourceVersions>,
    ) -> PoolResult<Self> {
        debug!("Stock(name={}, link={})", base.name, base.link.display());
        let index = StockIndex::load(
            base.root.join("index-sources"),
            base.root.join("index-binaries"),
        )?;
        Ok(Self {
            base,
            index,
            workdir: None,
            vcs,
            versions,
        })
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

    /// Tracked branch, unescaped
    pub fn branch(&self) -> Option<String> {
        self.base.branch().map(unescape_branch)
    }

    pub fn index(&self) -> &StockIndex {
        &self.index
    }

    fn sync_head_path(&self) -> PathBuf {
        self.base.root.join("SYNC_HEAD")
    }

    fn checkout_path(&self) -> PathBuf {
        self.base.root.join("checkout")
    }

    /// Revision recorded by the last completed sync
    pub fn sync_head(&self) -> PoolResult<Option<String>> {
        read_line(&self.sync_head_path())
    }

    /// Record or clear the sync head
    pub fn set_sync_head(&self, head: Option<&str>) -> PoolResult<()> {
        match head {
            Some(head) => write_line_atomic(&self.sync_head_path(), head),
            None => remove_file_if_exists(&self.sync_head_path()),
        }
    }

    fn no_such_branch(&self, branch: &str) -> PoolError {
        PoolError::NoSuchBranch {
            branch: branch.to_string(),
            path: self.base.link.clone(),
        }
    }

    /// The tree this stock is indexed from.
    ///
    /// Memoized: the checkout of a branch-tracked stock is materialized on
    /// first use only. `sync` refreshes it.
    pub fn workdir(&mut self) -> PoolResult<PathBuf> {
        if let Some(workdir) = &self.workdir {
            return Ok(workdir.clone());
        }
        self.refresh_workdir()
    }

    fn refresh_workdir(&mut self) -> PoolResult<PathBuf> {
        let workdir = match self.branch() {
            None => self.base.link.clone(),
            Some(branch) => self.materialize_checkout(&branch)?,
        };
        self.workdir = Some(workdir.clone());
        Ok(workdir)
    }

    fn materialize_checkout(&self, branch: &str) -> PoolResult<PathBuf> {
        let origin = &self.base.link;
        let checkout = self.checkout_path();

        if !checkout.exists() {
            ensure_dir(&checkout)?;
            self.vcs.init_checkout(&checkout, origin)?;
        }

        let commit = self
            .vcs
            .resolve(origin, branch)?
            .ok_or_else(|| self.no_such_branch(branch))?;
        self.vcs
            .update_ref(&checkout, &format!("refs/heads/{}", branch), &commit)?;
        self.vcs.checkout(&checkout, branch)?;

        for tag in self.vcs.list_tags(&checkout)? {
            self.vcs.remove_ref(&checkout, &format!("refs/tags/{}", tag))?;
        }
        for tag in self.vcs.list_tags(origin)? {
            let mirrored = self.vcs.resolve(origin, &tag).and_then(|rev| match rev {
                Some(rev) => self
                    .vcs
                    .update_ref(&checkout, &format!("refs/tags/{}", tag), &rev),
                None => Err(PoolError::command_exec(
                    format!("resolve tag {}", tag),
                    "unresolvable",
                )),
            });
            if let Err(e) = mirrored {
                warn!("stock {}: skipping tag {}: {}", self.base.name, tag, e);
            }
        }

        Ok(checkout)
    }

    /// Rebuild the index from the current workdir, importing binaries into `cache`.
    ///
    /// A branch-tracked stock whose sync head matches the branch's current
    /// revision is left untouched.
    pub fn sync(&mut self, cache: &mut PackageCache) -> PoolResult<()> {
        debug!("Stock[{}].sync()", self.base.name);
        let branch = self.branch();

        if let Some(branch) = &branch {
            let current = self
                .vcs
                .resolve(&self.base.link, branch)?
                .ok_or_else(|| self.no_such_branch(branch))?;
            if self.sync_head()?.as_deref() == Some(current.as_str()) {
                debug!("stock {} already synced at {}", self.base.name, current);
                return Ok(());
            }
        }

        self.index.reset()?;
        let workdir = self.refresh_workdir()?;
        self.walk(&workdir, cache)?;

        if branch.is_some() {
            let head = self.vcs.resolve(&self.checkout_path(), "HEAD")?;
            self.set_sync_head(head.as_deref())?;
        }
        info!("synced stock {}", self.base.name);
        Ok(())
    }

    fn walk(&mut self, workdir: &Path, cache: &mut PackageCache) -> PoolResult<()> {
        let mut entries = WalkDir::new(workdir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = entries.next() {
            let entry = entry.map_err(|e| walk_error(workdir, e))?;
            let path = entry.path();
            let rel = path.strip_prefix(workdir).unwrap_or(path);

            if entry.file_type().is_dir() {
                if entry.file_name() == ".git" {
                    entries.skip_current_dir();
                } else if path.join(SOURCE_DESCRIPTOR).is_file() {
                    self.record_source(path, rel)?;
                    entries.skip_current_dir();
                }
                continue;
            }

            if entry.file_type().is_file() && is_binary_artifact(path) {
                cache.add(path)?;
                self.index.record_binary(rel)?;
            }
        }
        Ok(())
    }

    fn record_source(&mut self, dir: &Path, rel: &Path) -> PoolResult<()> {
        let packages = source_package_names(dir)?;
        let versions = self.versions.list_versions(dir)?;
        debug!(
            "stock {}: {} -> {:?} @ {:?}",
            self.base.name,
            rel.display(),
            packages,
            versions
        );
        for package in packages {
            self.index.record_source(rel, &package, &versions)?;
        }
        Ok(())
    }

    /// Directory of the source package `name` at `version`, if indexed here
    pub fn source_path(&mut self, name: &str, version: &str) -> PoolResult<Option<PathBuf>> {
        let found = self.index.sources().find_map(|(path, versions)| {
            let matches = path.file_name().is_some_and(|n| n == name)
                && versions.iter().any(|v| v == version);
            matches.then(|| path.parent().map(Path::to_path_buf).unwrap_or_default())
        });
        let Some(rel_dir) = found else {
            return Ok(None);
        };
        let workdir = self.workdir()?;
        if rel_dir.as_os_str().is_empty() {
            Ok(Some(workdir))
        } else {
            Ok(Some(workdir.join(rel_dir)))
        }
    }

    /// True if a source package `name` is indexed (at `version`, if given)
    pub fn has_source(&self, name: &str, version: Option<&str>) -> bool {
        self.index.sources().any(|(path, versions)| {
            path.file_name().is_some_and(|n| n == name)
                && version.is_none_or(|v| versions.iter().any(|known| known == v))
        })
    }

    /// Every (name, version) this stock's index references
    pub fn referenced_packages(&self) -> PoolResult<Vec<(String, String)>> {
        let mut packages: Vec<(String, String)> = self
            .index
            .sources()
            .flat_map(|(path, versions)| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                versions.iter().map(move |v| (name.clone(), v.clone()))
            })
            .collect();

        for path in self.index.binaries()? {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match parse_package_filename(&filename) {
                Ok(pair) => packages.push(pair),
                Err(e) => warn!("stock {}: {}", self.base.name, e),
            }
        }
        Ok(packages)
    }
}
