//! The pool front
//!
//! [`Pool`] wraps a kernel, in this process or in a worker running as the
//! pool owner, and adds the batch operations the command line needs:
//! glob listing, bulk retrieval into an output directory and build-log
//! lookup.

use crate::backend::create_backends;
use crate::config::Config;
use crate::error::{PoolError, PoolResult};
use crate::fsutil::{canonical, ensure_dir, hardlink_or_copy};
use crate::kernel::{is_pool, PoolApi, PoolKernel, PoolPaths};
use crate::package::tree_dir;
use crate::proxy::KernelClient;
use crate::version;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of a batch operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageList {
    /// `name=version` of every package listed or fetched
    pub packages: Vec<String>,
    /// Arguments that matched nothing
    pub missing: Vec<String>,
    /// Packages that exist but could not be retrieved
    pub failed: Vec<String>,
}

pub struct Pool {
    kernel: Box<dyn PoolApi>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool").finish_non_exhaustive()
    }
}

impl Pool {
    /// Create a new pool at `path` building inside `buildroot`
    pub fn init_create(path: &Path, buildroot: &Path) -> PoolResult<()> {
        PoolKernel::init_create(path, buildroot)
    }

    /// Open the pool at `path`.
    ///
    /// When running as root on a pool owned by someone else, the kernel is
    /// opened in a worker running as the owner unless `privileges.drop` is
    /// off.
    pub fn open(path: &Path, debug: bool, config: &Config) -> PoolResult<Self> {
        let root = canonical(path);
        if !is_pool(&root) {
            return Err(PoolError::NotInitialized(root));
        }

        let (uid, gid) = PoolPaths::new(&root).owner()?;
        // SAFETY: getuid has no preconditions and cannot fail
        let caller = unsafe { libc::getuid() };

        if caller == 0 && uid != caller && config.privileges.drop {
            info!("dropping privileges to {}:{}", uid, gid);
            let client = KernelClient::spawn(&root, debug, &config.tools, uid, gid)?;
            return Ok(Self::from_kernel(Box::new(client)));
        }

        let mut kernel = PoolKernel::open(&root, create_backends(&config.tools))?;
        kernel.set_debug(debug)?;
        Ok(Self::from_kernel(Box::new(kernel)))
    }

    pub fn from_kernel(kernel: Box<dyn PoolApi>) -> Self {
        Self { kernel }
    }

    /// The kernel, for operations the front passes through unchanged
    pub fn kernel_mut(&mut self) -> &mut dyn PoolApi {
        self.kernel.as_mut()
    }

    /// List packages, newest version first.
    ///
    /// With `globs`, only packages whose name matches one are listed, and
    /// globs matching nothing are reported as missing.
    pub fn list(&mut self, all_versions: bool, globs: &[String]) -> PoolResult<PackageList> {
        let all = self.kernel.list(all_versions)?;
        let mut list = PackageList::default();

        if globs.is_empty() {
            list.packages = all;
        } else {
            for pattern in globs {
                let matcher = glob::Pattern::new(pattern);
                let matches: Vec<String> = all
                    .iter()
                    .filter(|package| {
                        let name = package_name(package);
                        match &matcher {
                            Ok(m) => m.matches(name),
                            Err(_) => name == pattern.as_str(),
                        }
                    })
                    .cloned()
                    .collect();

                if matches.is_empty() {
                    list.missing.push(pattern.clone());
                } else {
                    list.packages.extend(matches);
                }
            }
        }

        sort_newest_first(&mut list.packages);
        Ok(list)
    }

    /// Fetch `packages` into `output_dir`, building them as needed.
    ///
    /// Stocks are synced once for the whole batch. Unversioned packages get
    /// their newest version. Files already present are left alone.
    pub fn get(
        &mut self,
        output_dir: &Path,
        packages: &[String],
        tree_fmt: bool,
        strict: bool,
        source: bool,
    ) -> PoolResult<PackageList> {
        self.kernel.set_autosync(false)?;
        let fetched = self.fetch(output_dir, packages, tree_fmt, strict, source);
        let restored = self.kernel.set_autosync(true);

        let list = fetched?;
        restored?;
        Ok(list)
    }

    fn fetch(
        &mut self,
        output_dir: &Path,
        packages: &[String],
        tree_fmt: bool,
        strict: bool,
        source: bool,
    ) -> PoolResult<PackageList> {
        self.kernel.sync()?;

        let mut list = PackageList::default();
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();
        for package in packages {
            if !self.kernel.exists(package)? {
                if strict {
                    return Err(PoolError::NoSuchPackage(package.clone()));
                }
                list.missing.push(package.clone());
                continue;
            }
            if package.contains('=') {
                resolved.push(package.clone());
            } else {
                unresolved.push(package.clone());
            }
        }
        if !unresolved.is_empty() {
            resolved.extend(self.kernel.resolve(&unresolved)?);
        }

        ensure_dir(output_dir)?;
        for package in resolved {
            let Some(src) = self.kernel.getpath(&package, true, source)? else {
                warn!("{} exists but could not be retrieved", package);
                list.failed.push(package);
                continue;
            };
            let file_name = src
                .file_name()
                .ok_or_else(|| PoolError::invalid_artifact(&src, "no filename"))?;

            let dest_dir = if tree_fmt {
                output_dir.join(tree_dir(package_name(&package)))
            } else {
                output_dir.to_path_buf()
            };
            ensure_dir(&dest_dir)?;

            let dest = dest_dir.join(file_name);
            if dest.exists() {
                debug!("{} already present", dest.display());
            } else {
                hardlink_or_copy(&src, &dest)?;
            }
            list.packages.push(package);
        }
        Ok(list)
    }

    /// Build log of a source package, or of the source a binary was built from
    pub fn build_log(&mut self, package: &str) -> PoolResult<PathBuf> {
        if let Some(path) = self.kernel.getpath_build_log(package)? {
            return Ok(path);
        }

        let source = self.kernel.binary_to_source(package)?;
        if let Some(source) = source.as_deref().filter(|s| *s != package) {
            debug!("{} was built from {}", package, source);
            if let Some(path) = self.kernel.getpath_build_log(source)? {
                return Ok(path);
            }
        }

        Err(PoolError::NoBuildLog(match source {
            Some(source) if source != package => format!("`{}' ({})", package, source),
            _ => format!("`{}'", package),
        }))
    }
}

fn package_name(package: &str) -> &str {
    package.split_once('=').map_or(package, |(name, _)| name)
}

/// Sort `name=version` ids by version, newest first. The sort is stable,
/// and unparseable versions compare as plain strings.
fn sort_newest_first(packages: &mut [String]) {
    let version_of = |p: &String| p.split_once('=').map(|(_, v)| v.to_string()).unwrap_or_default();
    packages.sort_by(|a, b| {
        let (a, b) = (version_of(a), version_of(b));
        version::compare(&b, &a).unwrap_or_else(|_| b.cmp(&a))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_deb, write_deb_with_source, write_source, FakeBuilder, Fakes};
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        fakes: Fakes,
        tree: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_builder(FakeBuilder::default())
        }

        fn with_builder(builder: FakeBuilder) -> Self {
            let dir = TempDir::new().unwrap();
            let tree = dir.path().join("tree");
            fs::create_dir_all(&tree).unwrap();
            fs::create_dir(dir.path().join("buildroot")).unwrap();
            Self {
                dir,
                fakes: Fakes::with_builder(builder),
                tree,
            }
        }

        fn pool(&self) -> Pool {
            let root = self.dir.path().join("pool");
            Pool::init_create(&root, &self.dir.path().join("buildroot")).unwrap();
            let mut kernel = PoolKernel::open(&root, self.fakes.backends()).unwrap();
            kernel.register(self.tree.to_str().unwrap()).unwrap();
            Pool::from_kernel(Box::new(kernel))
        }

        fn out(&self) -> PathBuf {
            self.dir.path().join("out")
        }
    }

    #[test]
    fn open_requires_pool() {
        let dir = TempDir::new().unwrap();
        let err = Pool::open(dir.path(), false, &Config::default()).unwrap_err();
        assert!(matches!(err, PoolError::NotInitialized(_)));
    }

    #[test]
    fn list_sorts_newest_first() {
        let fx = Fixture::new();
        write_source(&fx.tree.join("foo"), "foo", &["foo"], &["1.9", "1.10", "1:0.1"]);
        let mut pool = fx.pool();

        let list = pool.list(true, &[]).unwrap();
        assert_eq!(list.packages, vec!["foo=1:0.1", "foo=1.10", "foo=1.9"]);
        assert!(list.missing.is_empty());
    }

    #[test]
    fn list_filters_by_glob_and_reports_missing() {
        let fx = Fixture::new();
        write_source(&fx.tree.join("libfoo"), "libfoo", &["libfoo", "libfoo-dev"], &["2.0"]);
        write_source(&fx.tree.join("bar"), "bar", &["bar"], &["1.0"]);
        let mut pool = fx.pool();

        let list = pool
            .list(false, &["libfoo*".to_string(), "nothing*".to_string()])
            .unwrap();
        assert_eq!(list.packages, vec!["libfoo=2.0", "libfoo-dev=2.0"]);
        assert_eq!(list.missing, vec!["nothing*"]);
    }

    #[test]
    fn get_builds_and_places_files() {
        let fx = Fixture::new();
        write_source(&fx.tree.join("foo"), "foo", &["foo"], &["1.0", "1.1"]);
        write_deb(&fx.tree.join("debs"), "bar", "2.0", "all");
        let mut pool = fx.pool();

        let list = pool
            .get(
                &fx.out(),
                &["foo".to_string(), "bar=2.0".to_string(), "ghost".to_string()],
                false,
                false,
                false,
            )
            .unwrap();

        assert_eq!(list.packages, vec!["bar=2.0", "foo=1.1"]);
        assert_eq!(list.missing, vec!["ghost"]);
        assert!(fx.out().join("foo_1.1_amd64.deb").is_file());
        assert!(fx.out().join("bar_2.0_all.deb").is_file());
        assert!(pool.kernel_mut().autosync().unwrap());
    }

    #[test]
    fn get_tree_format_uses_archive_dirs() {
        let fx = Fixture::new();
        write_deb(&fx.tree.join("debs"), "libbaz", "1.0", "amd64");
        write_deb(&fx.tree.join("debs"), "qux", "3.0", "all");
        let mut pool = fx.pool();

        pool.get(
            &fx.out(),
            &["libbaz=1.0".to_string(), "qux".to_string()],
            true,
            false,
            false,
        )
        .unwrap();

        assert!(fx.out().join("libb/libbaz/libbaz_1.0_amd64.deb").is_file());
        assert!(fx.out().join("q/qux/qux_3.0_all.deb").is_file());
    }

    #[test]
    fn get_leaves_existing_files() {
        let fx = Fixture::new();
        write_deb(&fx.tree.join("debs"), "bar", "2.0", "all");
        let mut pool = fx.pool();
        fs::create_dir_all(fx.out()).unwrap();
        fs::write(fx.out().join("bar_2.0_all.deb"), "local copy").unwrap();

        pool.get(&fx.out(), &["bar".to_string()], false, false, false)
            .unwrap();

        assert_eq!(
            fs::read_to_string(fx.out().join("bar_2.0_all.deb")).unwrap(),
            "local copy"
        );
    }

    #[test]
    fn get_strict_fails_on_missing() {
        let fx = Fixture::new();
        let mut pool = fx.pool();

        let err = pool
            .get(&fx.out(), &["ghost".to_string()], false, true, false)
            .unwrap_err();
        assert!(matches!(err, PoolError::NoSuchPackage(p) if p == "ghost"));
        assert!(pool.kernel_mut().autosync().unwrap());
    }

    #[test]
    fn get_build_failure_restores_autosync() {
        let fx = Fixture::with_builder(FakeBuilder {
            fail: true,
            ..FakeBuilder::default()
        });
        write_source(&fx.tree.join("foo"), "foo", &["foo"], &["1.0"]);
        let mut pool = fx.pool();

        let err = pool
            .get(&fx.out(), &["foo".to_string()], false, false, false)
            .unwrap_err();
        assert!(matches!(err, PoolError::BuildFailed { .. }));
        assert!(pool.kernel_mut().autosync().unwrap());
    }

    #[test]
    fn build_log_of_source_and_of_binary() {
        let fx = Fixture::new();
        write_source(&fx.tree.join("foo"), "foo", &["foo", "foo-utils"], &["1.0"]);
        let mut pool = fx.pool();
        pool.get(&fx.out(), &["foo-utils=1.0".to_string()], false, false, false)
            .unwrap();

        let direct = pool.build_log("foo").unwrap();
        assert!(direct.ends_with("foo_1.0.build"));

        let via_binary = pool.build_log("foo-utils").unwrap();
        assert_eq!(via_binary, direct);
    }

    #[test]
    fn build_log_missing() {
        let fx = Fixture::new();
        write_deb_with_source(&fx.tree.join("debs"), "bin", "1.0", "all", Some("src"));
        let mut pool = fx.pool();

        let err = pool.build_log("bin").unwrap_err();
        assert!(matches!(err, PoolError::NoBuildLog(_)));
        assert!(err.to_string().contains("(src)"));
    }

    #[test]
    fn sort_falls_back_to_strings() {
        let mut packages = vec![
            "a=1.0".to_string(),
            "b=not a version".to_string(),
            "c=2.0".to_string(),
        ];
        sort_newest_first(&mut packages);
        assert_eq!(packages, vec!["b=not a version", "c=2.0", "a=1.0"]);
    }
}
