//! The orchestration kernel
//!
//! A [`PoolKernel`] ties one pool's package cache and stocks together:
//! - existence, listing and resolution of package identifiers across the
//!   cache, the leaf stocks and every subpool
//! - on-demand builds of source packages into the cache
//! - garbage collection of cached packages no stock references
//!
//! Unless autosync is disabled, every operation reading stock-derived data
//! first syncs the leaf stocks. Subpools are kernels of their own and are
//! queried recursively.

mod api;
mod build;
mod layout;

pub use api::{GcReport, InfoQuery, InfoReport, InventoryEntry, PoolApi, PoolInfo};
pub use layout::{is_pool, PoolPaths, CONTROL_DIR};

use crate::backend::Backends;
use crate::cache::PackageCache;
use crate::error::{PoolError, PoolResult};
use crate::fsutil::{canonical, ensure_dir};
use crate::package::{fmt_package_id, PackageId, BUILD_LOG_SUFFIX};
use crate::stock::Stocks;
use crate::version::Version;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct PoolKernel {
    path: PathBuf,
    paths: PoolPaths,
    buildroot: PathBuf,
    cache: PackageCache,
    stocks: Stocks,
    backends: Backends,
    autosync: bool,
    debug: bool,
}

impl std::fmt::Debug for PoolKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolKernel")
            .field("path", &self.path)
            .field("autosync", &self.autosync)
            .field("debug", &self.debug)
            .finish()
    }
}

impl PoolKernel {
    /// Create a new pool at `path` building inside `buildroot`
    pub fn init_create(path: &Path, buildroot: &Path) -> PoolResult<()> {
        let root = std::path::absolute(path)
            .map_err(|e| PoolError::io(format!("resolving {}", path.display()), e))?;
        PoolPaths::new(&root).create(buildroot)?;
        info!("initialized pool at {}", root.display());
        Ok(())
    }

    /// Open the pool rooted at `path`
    pub fn open(path: &Path, backends: Backends) -> PoolResult<Self> {
        Self::open_nested(path, Vec::new(), backends, false)
    }

    /// Open a pool reached through a chain of subpools.
    ///
    /// `recursed` holds the canonical roots of every pool above this one;
    /// this pool's root is appended before its own stocks are loaded.
    pub fn open_nested(
        path: &Path,
        mut recursed: Vec<PathBuf>,
        backends: Backends,
        debug: bool,
    ) -> PoolResult<Self> {
        let root = canonical(path);
        let paths = PoolPaths::new(&root);
        if !paths.control.is_dir() {
            return Err(PoolError::NotInitialized(root));
        }
        debug!("PoolKernel(path={}, recursed={:?})", root.display(), recursed);

        let buildroot = fs::read_link(&paths.build_root)
            .map_err(|e| PoolError::io(format!("reading {}", paths.build_root.display()), e))?;
        let cache = PackageCache::open(&paths.pkgcache, backends.reader.clone())?;

        recursed.push(root.clone());
        let stocks = Stocks::load(&paths.stocks, recursed, backends.clone(), debug)?;
        ensure_dir(&paths.tmp)?;

        Ok(Self {
            path: root,
            paths,
            buildroot,
            cache,
            stocks,
            backends,
            autosync: true,
            debug,
        })
    }

    pub fn root(&self) -> &Path {
        &self.path
    }

    pub fn buildroot(&self) -> &Path {
        &self.buildroot
    }

    pub fn cache(&self) -> &PackageCache {
        &self.cache
    }

    pub fn stocks(&self) -> &Stocks {
        &self.stocks
    }

    fn autosync_now(&mut self) -> PoolResult<()> {
        if self.autosync {
            self.stocks.sync(&mut self.cache)?;
        }
        Ok(())
    }

    /// Every known (name, version), newest only unless `all_versions`
    fn list_pairs(&mut self, all_versions: bool) -> PoolResult<Vec<(String, String)>> {
        self.autosync_now()?;

        let mut packages: BTreeSet<(String, String)> = BTreeSet::new();
        for subpool in self.stocks.subpools_mut() {
            packages.extend(subpool.kernel_mut().list_pairs(all_versions)?);
        }
        packages.extend(self.cache.list());
        for stock in self.stocks.iter() {
            for (path, versions) in stock.index().sources() {
                let name = file_name(path);
                packages.extend(versions.iter().map(|v| (name.clone(), v.clone())));
            }
        }

        if all_versions {
            return Ok(packages.into_iter().collect());
        }
        Ok(newest_versions(packages))
    }

    /// Versions of `name` cached here or in any subpool
    fn cached_versions(&self, name: &str) -> Vec<String> {
        let mut versions = self.cache.versions(name);
        for subpool in self.stocks.subpools() {
            versions.extend(subpool.kernel().cached_versions(name));
        }
        versions
    }

    fn stock_sources(&self) -> Vec<InventoryEntry> {
        let mut entries = Vec::new();
        for stock in self.stocks.iter() {
            for (path, versions) in stock.index().sources() {
                let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
                let name = file_name(path);
                entries.extend(versions.iter().map(|version| InventoryEntry {
                    package: fmt_package_id(&name, version),
                    stock: stock.name().to_string(),
                    dir: dir.clone(),
                }));
            }
        }
        entries
    }

    fn stock_binaries(&self) -> PoolResult<Vec<InventoryEntry>> {
        let mut entries = Vec::new();
        for stock in self.stocks.iter() {
            for path in stock.index().binaries()? {
                entries.push(InventoryEntry {
                    package: file_name(&path),
                    stock: stock.name().to_string(),
                    dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
                });
            }
        }
        Ok(entries)
    }

    fn subpool_paths(&self) -> Vec<PathBuf> {
        self.stocks
            .subpools()
            .map(|s| s.kernel().root().to_path_buf())
            .collect()
    }

    fn stock_references(&self) -> Vec<String> {
        self.stocks.iter().map(|s| s.base().reference()).collect()
    }

    fn report(&mut self, query: InfoQuery) -> PoolResult<InfoReport> {
        Ok(match query {
            InfoQuery::Registered => InfoReport::Registered {
                stocks: self.stock_references(),
                subpools: self.subpool_paths(),
            },
            InfoQuery::Stocks => InfoReport::Stocks(self.stock_references()),
            InfoQuery::Subpools => InfoReport::Subpools(self.subpool_paths()),
            InfoQuery::BuildRoot => InfoReport::BuildRoot(self.buildroot.clone()),
            InfoQuery::BuildLogs => InfoReport::BuildLogs(
                self.build_log_pairs()?
                    .iter()
                    .map(|(name, version)| fmt_package_id(name, version))
                    .collect(),
            ),
            InfoQuery::PkgCache => {
                self.stocks.sync(&mut self.cache)?;
                InfoReport::PkgCache(
                    self.cache
                        .list()
                        .iter()
                        .map(|(name, version)| fmt_package_id(name, version))
                        .collect(),
                )
            }
            InfoQuery::StockSources => {
                self.stocks.sync(&mut self.cache)?;
                InfoReport::StockSources(self.stock_sources())
            }
            InfoQuery::StockBinaries => {
                self.stocks.sync(&mut self.cache)?;
                InfoReport::StockBinaries(self.stock_binaries()?)
            }
        })
    }

    fn build_log_pairs(&self) -> PoolResult<Vec<(String, String)>> {
        let dir = &self.paths.build_logs;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let suffix = format!(".{}", BUILD_LOG_SUFFIX);
        let read_error = |e| PoolError::io(format!("reading {}", dir.display()), e);
        let mut logs = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_error)? {
            let entry = entry.map_err(read_error)?;
            if !entry.path().is_file() {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().into_owned();
            let parsed = filename
                .strip_suffix(&suffix)
                .and_then(|stem| stem.split_once('_'));
            if let Some((name, version)) = parsed {
                logs.push((name.to_string(), version.to_string()));
            }
        }
        logs.sort();
        Ok(logs)
    }

    fn build_log_path(&self, name: &str, version: &str) -> PathBuf {
        self.paths
            .build_logs
            .join(format!("{}_{}.{}", name, version, BUILD_LOG_SUFFIX))
    }
}

impl PoolApi for PoolKernel {
    fn path(&mut self) -> PoolResult<PathBuf> {
        Ok(self.path.clone())
    }

    fn register(&mut self, stock: &str) -> PoolResult<()> {
        let name = self.stocks.register(stock)?;
        info!("registered stock {}", name);
        Ok(())
    }

    fn unregister(&mut self, stock: &str) -> PoolResult<()> {
        self.stocks.unregister(stock, &mut self.cache)
    }

    fn exists(&mut self, package: &str) -> PoolResult<bool> {
        self.autosync_now()?;
        let id = PackageId::parse(package)?;
        let version = id.version.as_deref();

        if self.cache.exists(&id.name, version) {
            return Ok(true);
        }
        if self.stocks.exists_source_version(&id.name, version) {
            return Ok(true);
        }
        for subpool in self.stocks.subpools_mut() {
            if subpool.kernel_mut().exists(package)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn list(&mut self, all_versions: bool) -> PoolResult<Vec<String>> {
        Ok(self
            .list_pairs(all_versions)?
            .iter()
            .map(|(name, version)| fmt_package_id(name, version))
            .collect())
    }

    fn resolve(&mut self, packages: &[String]) -> PoolResult<Vec<String>> {
        let newest: BTreeMap<String, String> = self.list_pairs(false)?.into_iter().collect();

        packages
            .iter()
            .map(|package| {
                let id = PackageId::parse(package)?;
                let version = match id.version {
                    Some(version) => version,
                    None => newest
                        .get(&id.name)
                        .cloned()
                        .ok_or_else(|| PoolError::UnresolvablePackage(id.name.clone()))?,
                };
                debug!("resolved {} -> {}={}", package, id.name, version);
                Ok(fmt_package_id(&id.name, &version))
            })
            .collect()
    }

    fn getpath(
        &mut self,
        package: &str,
        build: bool,
        source: bool,
    ) -> PoolResult<Option<PathBuf>> {
        self.autosync_now()?;
        let id = PackageId::parse(package)?;
        let version = id.require_version()?;

        if let Some(path) = self.cache.getpath(&id.name, version) {
            return Ok(Some(path));
        }
        for subpool in self.stocks.subpools_mut() {
            if let Some(path) = subpool.kernel_mut().getpath(package, build, source)? {
                return Ok(Some(path));
            }
        }
        if !build {
            return Ok(None);
        }

        let Some(source_path) = self.stocks.get_source_path(&id.name, version)? else {
            return Ok(None);
        };
        self.build_package(&source_path, &id.name, version, source)?;

        self.cache
            .getpath(&id.name, version)
            .map(Some)
            .ok_or_else(|| PoolError::ArtifactMissingAfterBuild(package.to_string()))
    }

    fn build_logs(&mut self) -> PoolResult<Vec<(String, String)>> {
        self.build_log_pairs()
    }

    fn getpath_build_log(&mut self, package: &str) -> PoolResult<Option<PathBuf>> {
        let id = PackageId::parse(package)?;
        let logs = self.build_log_pairs()?;
        let mut candidates = logs.iter().filter(|(name, _)| *name == id.name);

        let found = match &id.version {
            Some(version) => candidates.find(|(_, v)| v == version).cloned(),
            None => candidates
                .filter_map(|(name, v)| match Version::parse(v) {
                    Ok(parsed) => Some((parsed, name)),
                    Err(e) => {
                        warn!("skipping build log {}_{}: {}", name, v, e);
                        None
                    }
                })
                .max_by(|a, b| a.0.cmp(&b.0))
                .map(|(v, name)| (name.clone(), v.as_str().to_string())),
        };
        if let Some((name, version)) = found {
            return Ok(Some(self.build_log_path(&name, &version)));
        }

        for subpool in self.stocks.subpools_mut() {
            if let Some(path) = subpool.kernel_mut().getpath_build_log(package)? {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    fn binary_to_source(&mut self, package: &str) -> PoolResult<Option<String>> {
        self.autosync_now()?;
        let id = PackageId::parse(package)?;

        let version = match &id.version {
            Some(version) => version.clone(),
            None => {
                let newest = self
                    .cached_versions(&id.name)
                    .iter()
                    .filter_map(|v| Version::parse(v).ok())
                    .max();
                match newest {
                    Some(version) => version.as_str().to_string(),
                    None => return Ok(None),
                }
            }
        };

        let versioned = fmt_package_id(&id.name, &version);
        let Some(path) = self.getpath(&versioned, false, false)? else {
            return Ok(None);
        };
        let source = self.backends.reader.read_metadata(&path)?.source;

        Ok(Some(match (source, &id.version) {
            (Some(source), Some(version)) => fmt_package_id(&source, version),
            (Some(source), None) => source,
            (None, _) => package.to_string(),
        }))
    }

    fn gc(&mut self, recurse: bool) -> PoolResult<GcReport> {
        self.autosync_now()?;

        let mut whitelist: BTreeSet<(String, String)> = BTreeSet::new();
        for stock in self.stocks.iter() {
            whitelist.extend(stock.referenced_packages()?);
        }
        debug!("{} whitelisted packages in {}", whitelist.len(), self.path.display());

        let mut report = GcReport {
            whitelisted: whitelist.len(),
            removed: Vec::new(),
        };
        for (name, version) in self.cache.list() {
            if whitelist.contains(&(name.clone(), version.clone())) {
                continue;
            }
            info!("pkgcache: removing {}={}", name, version);
            self.cache.remove(&name, &version)?;
            report.removed.push(fmt_package_id(&name, &version));
        }

        for stock in self.stocks.iter() {
            stock.set_sync_head(None)?;
        }

        if recurse {
            for subpool in self.stocks.subpools_mut() {
                report.merge(subpool.kernel_mut().gc(recurse)?);
            }
        }
        Ok(report)
    }

    fn sync(&mut self) -> PoolResult<()> {
        self.stocks.sync(&mut self.cache)
    }

    fn info(&mut self, query: InfoQuery, recursive: bool) -> PoolResult<Vec<PoolInfo>> {
        let mut infos = vec![PoolInfo {
            path: self.path.clone(),
            report: self.report(query)?,
        }];
        if recursive {
            for subpool in self.stocks.subpools_mut() {
                infos.extend(subpool.kernel_mut().info(query, true)?);
            }
        }
        Ok(infos)
    }

    fn autosync(&mut self) -> PoolResult<bool> {
        Ok(self.autosync)
    }

    fn set_autosync(&mut self, autosync: bool) -> PoolResult<()> {
        self.autosync = autosync;
        Ok(())
    }

    fn debug(&mut self) -> PoolResult<bool> {
        Ok(self.debug)
    }

    /// Also applies to every subpool
    fn set_debug(&mut self, debug: bool) -> PoolResult<()> {
        self.debug = debug;
        for subpool in self.stocks.subpools_mut() {
            subpool.kernel_mut().set_debug(debug)?;
        }
        Ok(())
    }

    fn pool_owner(&mut self) -> PoolResult<(u32, u32)> {
        self.paths.owner()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Keep the newest version of each name. Unparseable versions are skipped.
fn newest_versions(packages: impl IntoIterator<Item = (String, String)>) -> Vec<(String, String)> {
    let mut newest: BTreeMap<String, Version> = BTreeMap::new();
    for (name, version) in packages {
        let parsed = match Version::parse(&version) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("skipping {} {}: {}", name, version, e);
                continue;
            }
        };
        match newest.get(&name) {
            Some(current) if *current >= parsed => {}
            _ => {
                newest.insert(name, parsed);
            }
        }
    }
    newest
        .into_iter()
        .map(|(name, version)| (name, version.as_str().to_string()))
        .collect()
}
