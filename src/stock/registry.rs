//! The aggregate of a pool's registered stocks

use super::{Stock, StockBase, StockPool, StockRef};
use crate::backend::Backends;
use crate::cache::PackageCache;
use crate::error::{PoolError, PoolResult};
use crate::fsutil::{canonical, remove_tree};
use crate::kernel::is_pool;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// All stocks registered under one pool's `stocks/` directory.
///
/// Iteration order is by stock name.
#[derive(Debug)]
pub struct Stocks {
    path: PathBuf,
    recursed: Vec<PathBuf>,
    backends: Backends,
    debug: bool,
    stocks: BTreeMap<String, Stock>,
    subpools: BTreeMap<String, StockPool>,
}

impl Stocks {
    /// Load every stock under `path`.
    ///
    /// `recursed` is the nesting chain down to and including the pool that
    /// owns `path`.
    pub fn load(
        path: impl Into<PathBuf>,
        recursed: Vec<PathBuf>,
        backends: Backends,
        debug: bool,
    ) -> PoolResult<Self> {
        let mut stocks = Self {
            path: path.into(),
            recursed,
            backends,
            debug,
            stocks: BTreeMap::new(),
            subpools: BTreeMap::new(),
        };
        stocks.reload()?;
        Ok(stocks)
    }

    /// Drop in-memory state and load the stock directory again
    pub fn reload(&mut self) -> PoolResult<()> {
        debug!("loading stocks from {}", self.path.display());
        self.stocks.clear();
        self.subpools.clear();

        let entries = fs::read_dir(&self.path)
            .map_err(|e| PoolError::io(format!("reading {}", self.path.display()), e))?;
        let mut roots: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        roots.sort();

        for root in roots {
            if !root.is_dir() {
                debug!("ignoring non-stock {}", root.display());
                continue;
            }
            self.load_stock(&root)?;
        }
        Ok(())
    }

    /// Load one stock directory. Only a nesting cycle is fatal.
    fn load_stock(&mut self, root: &Path) -> PoolResult<()> {
        debug!("loading stock from {}", root.display());
        let base = match StockBase::open(root) {
            Ok(base) => base,
            Err(e) => {
                warn!("skipping stock {}: {}", root.display(), e);
                return Ok(());
            }
        };

        if is_pool(&base.link) {
            match StockPool::open(base, &self.recursed, &self.backends, self.debug) {
                Ok(subpool) => {
                    self.subpools.insert(subpool.name().to_string(), subpool);
                }
                Err(e @ PoolError::CircularDependency { .. }) => return Err(e),
                Err(e) => warn!("skipping subpool {}: {}", root.display(), e),
            }
            return Ok(());
        }

        let stock = Stock::open(
            base,
            self.backends.vcs.clone(),
            self.backends.versions.clone(),
        );
        match stock {
            Ok(stock) => {
                self.stocks.insert(stock.name().to_string(), stock);
            }
            Err(e) => warn!("skipping stock {}: {}", root.display(), e),
        }
        Ok(())
    }

    /// Leaf stocks, by name
    pub fn iter(&self) -> impl Iterator<Item = &Stock> {
        self.stocks.values()
    }

    pub fn subpools(&self) -> impl Iterator<Item = &StockPool> {
        self.subpools.values()
    }

    pub fn subpools_mut(&mut self) -> impl Iterator<Item = &mut StockPool> {
        self.subpools.values_mut()
    }

    /// Number of leaf stocks
    pub fn len(&self) -> usize {
        self.stocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }

    fn contains(&self, name: &str) -> bool {
        self.stocks.contains_key(name) || self.subpools.contains_key(name)
    }

    /// Register `path[#branch]`, returning the new stock's name
    pub fn register(&mut self, reference: &str) -> PoolResult<String> {
        let mut stock_ref = StockRef::parse(reference)?;
        debug!("parsed {:?} -> {:?}", reference, stock_ref);

        if !stock_ref.path.is_dir() {
            return Err(PoolError::InvalidStock {
                path: stock_ref.path,
                reason: "not a directory".to_string(),
            });
        }

        let vcs = &self.backends.vcs;
        let is_repo = vcs.is_repository(&stock_ref.path);
        let no_such_branch = |branch: &str, path: &Path| PoolError::NoSuchBranch {
            branch: branch.to_string(),
            path: path.to_path_buf(),
        };

        match (stock_ref.branch.clone(), is_repo) {
            (Some(branch), false) => return Err(no_such_branch(&branch, &stock_ref.path)),
            (Some(branch), true) => {
                if vcs.resolve(&stock_ref.path, &branch)?.is_none() {
                    return Err(no_such_branch(&branch, &stock_ref.path));
                }
            }
            (None, true) => {
                let branch = vcs
                    .current_symbolic_branch(&stock_ref.path)?
                    .ok_or_else(|| no_such_branch("HEAD", &stock_ref.path))?;
                info!("chose branch {}", branch);
                stock_ref.branch = Some(branch);
            }
            (None, false) => {}
        }

        let name = stock_ref.stock_name();
        if self.contains(&name) {
            return Err(PoolError::AlreadyRegistered(name));
        }

        let root = self.path.join(&name);
        StockBase::create(&root, &stock_ref.path)?;
        if let Err(e) = self.load_stock(&root) {
            remove_tree(&root)?;
            return Err(e);
        }
        Ok(name)
    }

    /// Unregister the single stock matching `path[#branch]`.
    ///
    /// Cached packages referenced by a removed leaf stock and by no other
    /// leaf stock are evicted from `cache`.
    pub fn unregister(&mut self, reference: &str, cache: &mut PackageCache) -> PoolResult<()> {
        let stock_ref = StockRef::parse(reference)?;
        let target = canonical(&stock_ref.path);
        let branch = stock_ref.branch.as_deref().map(super::escape_branch);

        let matches_ref = |base: &StockBase| {
            canonical(&base.link) == target
                && branch
                    .as_deref()
                    .is_none_or(|b| base.branch() == Some(b))
        };

        let mut matches: Vec<(String, bool)> = self
            .stocks
            .values()
            .filter(|s| matches_ref(s.base()))
            .map(|s| (s.name().to_string(), true))
            .collect();
        matches.extend(
            self.subpools
                .values()
                .filter(|s| matches_ref(s.base()))
                .map(|s| (s.name().to_string(), false)),
        );

        let (name, is_leaf) = match matches.len() {
            0 => return Err(PoolError::NotFound(reference.to_string())),
            1 => matches.remove(0),
            _ => return Err(PoolError::AmbiguousMatch(reference.to_string())),
        };

        let root = if is_leaf {
            let Some(stock) = self.stocks.get(&name) else {
                return Err(PoolError::NotFound(reference.to_string()));
            };

            let mut blacklist: BTreeSet<(String, String)> =
                stock.referenced_packages()?.into_iter().collect();
            for (other_name, other) in &self.stocks {
                if *other_name == name {
                    continue;
                }
                for pair in other.referenced_packages()? {
                    blacklist.remove(&pair);
                }
            }
            let root = stock.base().root.clone();
            self.stocks.remove(&name);

            for (pkg, version) in cache.list() {
                if blacklist.contains(&(pkg.clone(), version.clone())) {
                    debug!("evicting {}={} with stock {}", pkg, version, name);
                    cache.remove(&pkg, &version)?;
                }
            }
            root
        } else {
            match self.subpools.remove(&name) {
                Some(subpool) => subpool.base().root.clone(),
                None => return Err(PoolError::NotFound(reference.to_string())),
            }
        };

        info!("unregistered stock {}", name);
        remove_tree(&root)
    }

    /// Sync every leaf stock
    pub fn sync(&mut self, cache: &mut PackageCache) -> PoolResult<()> {
        for stock in self.stocks.values_mut() {
            stock.sync(cache)?;
        }
        Ok(())
    }

    /// Directory of source package `name` at `version` in the first stock declaring it
    pub fn get_source_path(&mut self, name: &str, version: &str) -> PoolResult<Option<PathBuf>> {
        for stock in self.stocks.values_mut() {
            if let Some(path) = stock.source_path(name, version)? {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// True if any leaf stock declares source package `name` (at `version`, if given)
    pub fn exists_source_version(&self, name: &str, version: Option<&str>) -> bool {
        self.stocks.values().any(|s| s.has_source(name, version))
    }
}
