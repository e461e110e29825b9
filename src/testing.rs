//! In-process fakes for the external collaborators
//!
//! A fake "deb" is a file holding plain control text. Source trees list
//! their versions in `debian/versions`, one per line.

use crate::backend::{
    metadata_from_control, ArtifactMetadata, ArtifactReader, Backends, BuildOptions,
    PackageBuilder, SourceVersions, Vcs,
};
use crate::error::{PoolError, PoolResult};
use crate::fsutil::canonical;
use crate::package::source_package_names;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

pub const SEEK_MARKER: &str = ".seek";

/// Write a fake binary package and return its path
pub fn write_deb(dir: &Path, name: &str, version: &str, arch: &str) -> PathBuf {
    write_deb_with_source(dir, name, version, arch, None)
}

pub fn write_deb_with_source(
    dir: &Path,
    name: &str,
    version: &str,
    arch: &str,
    source: Option<&str>,
) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(format!("{}_{}_{}.deb", name, version, arch));
    let mut control = format!(
        "Package: {}\nVersion: {}\nArchitecture: {}\n",
        name, version, arch
    );
    if let Some(source) = source {
        control.push_str(&format!("Source: {}\n", source));
    }
    fs::write(&path, control).unwrap();
    path
}

/// Write a source package directory declaring `packages` at `versions`
pub fn write_source(dir: &Path, source: &str, packages: &[&str], versions: &[&str]) {
    fs::create_dir_all(dir.join("debian")).unwrap();
    let mut control = format!("Source: {}\n", source);
    for package in packages {
        control.push_str(&format!("\nPackage: {}\nArchitecture: any\n", package));
    }
    fs::write(dir.join("debian/control"), control).unwrap();
    fs::write(dir.join("debian/versions"), versions.join("\n") + "\n").unwrap();
}

pub struct FakeReader;

impl ArtifactReader for FakeReader {
    fn read_metadata(&self, artifact: &Path) -> PoolResult<ArtifactMetadata> {
        let control = fs::read_to_string(artifact)
            .map_err(|e| PoolError::io(format!("reading {}", artifact.display()), e))?;
        metadata_from_control(artifact, &control)
    }
}

#[derive(Default)]
pub struct FakeVersions {
    pub seeks: Mutex<Vec<(PathBuf, Option<String>)>>,
}

impl SourceVersions for FakeVersions {
    fn list_versions(&self, source_dir: &Path) -> PoolResult<Vec<String>> {
        let path = source_dir.join("debian/versions");
        let content = fs::read_to_string(&path)
            .map_err(|e| PoolError::io(format!("reading {}", path.display()), e))?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn seek(&self, source_dir: &Path, version: Option<&str>) -> PoolResult<()> {
        self.seeks
            .lock()
            .unwrap()
            .push((source_dir.to_path_buf(), version.map(str::to_string)));
        let marker = source_dir.join(SEEK_MARKER);
        match version {
            Some(version) => fs::write(&marker, version).unwrap(),
            None => {
                let _ = fs::remove_file(&marker);
            }
        }
        Ok(())
    }
}

/// Builds every declared package at the seeked version
#[derive(Default)]
pub struct FakeBuilder {
    pub fail: bool,
    /// Build "successfully" without producing any package
    pub produce_nothing: bool,
    pub builds: Mutex<Vec<(PathBuf, BuildOptions)>>,
}

impl PackageBuilder for FakeBuilder {
    fn build(
        &self,
        source_dir: &Path,
        _buildroot: &Path,
        output_dir: &Path,
        options: BuildOptions,
    ) -> PoolResult<bool> {
        self.builds
            .lock()
            .unwrap()
            .push((source_dir.to_path_buf(), options));

        fs::write(output_dir.join("partial.log"), "building\n").unwrap();
        if self.fail {
            return Ok(false);
        }
        if self.produce_nothing {
            return Ok(true);
        }

        let version = fs::read_to_string(source_dir.join(SEEK_MARKER)).unwrap();
        let source = source_dir.file_name().unwrap().to_string_lossy().into_owned();
        for package in source_package_names(source_dir)? {
            write_deb_with_source(output_dir, &package, &version, "amd64", Some(&source));
        }
        fs::write(
            output_dir.join(format!("{}_{}.build", source, version)),
            format!("log for {} {}\n", source, version),
        )
        .unwrap();
        fs::write(output_dir.join(format!("{}_{}_amd64.buildinfo", source, version)), "").unwrap();
        fs::write(output_dir.join(format!("{}_{}.tar.xz", source, version)), "").unwrap();
        Ok(true)
    }
}

#[derive(Default, Clone)]
struct FakeRepo {
    refs: BTreeMap<String, String>,
    head_branch: Option<String>,
    head_rev: Option<String>,
    broken_tags: Vec<String>,
}

/// In-memory version control. Revisions are snapshot directories.
#[derive(Default)]
pub struct FakeVcs {
    repos: Mutex<HashMap<PathBuf, FakeRepo>>,
    snapshots: Mutex<HashMap<String, PathBuf>>,
}

impl FakeVcs {
    /// Register `path` as a repository with `branch` at `rev`
    pub fn add_repo(&self, path: &Path, branch: &str, rev: &str) {
        let mut repo = FakeRepo::default();
        repo.refs
            .insert(format!("refs/heads/{}", branch), rev.to_string());
        repo.head_branch = Some(branch.to_string());
        repo.head_rev = Some(rev.to_string());
        self.repos.lock().unwrap().insert(canonical(path), repo);
    }

    pub fn set_ref(&self, path: &Path, name: &str, rev: &str) {
        let mut repos = self.repos.lock().unwrap();
        let repo = repos.get_mut(&canonical(path)).unwrap();
        repo.refs.insert(name.to_string(), rev.to_string());
    }

    pub fn detach_head(&self, path: &Path) {
        let mut repos = self.repos.lock().unwrap();
        repos.get_mut(&canonical(path)).unwrap().head_branch = None;
    }

    pub fn add_broken_tag(&self, path: &Path, tag: &str) {
        let mut repos = self.repos.lock().unwrap();
        let repo = repos.get_mut(&canonical(path)).unwrap();
        repo.broken_tags.push(tag.to_string());
    }

    /// Make `rev` check out as a copy of `tree`
    pub fn add_snapshot(&self, rev: &str, tree: &Path) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(rev.to_string(), tree.to_path_buf());
    }

    pub fn tags(&self, path: &Path) -> Vec<String> {
        self.list_tags(path).unwrap()
    }

    fn lookup(repo: &FakeRepo, reference: &str) -> Option<String> {
        if reference == "HEAD" {
            return repo.head_rev.clone();
        }
        [
            reference.to_string(),
            format!("refs/heads/{}", reference),
            format!("refs/tags/{}", reference),
        ]
        .iter()
        .find_map(|name| repo.refs.get(name).cloned())
    }

    fn missing(path: &Path) -> PoolError {
        PoolError::command_exec(format!("fake-vcs {}", path.display()), "not a repository")
    }
}

impl Vcs for FakeVcs {
    fn is_repository(&self, path: &Path) -> bool {
        self.repos.lock().unwrap().contains_key(&canonical(path))
    }

    fn init_checkout(&self, checkout: &Path, _objects_from: &Path) -> PoolResult<()> {
        fs::create_dir_all(checkout).unwrap();
        self.repos
            .lock()
            .unwrap()
            .insert(canonical(checkout), FakeRepo::default());
        Ok(())
    }

    fn resolve(&self, repo: &Path, reference: &str) -> PoolResult<Option<String>> {
        let repos = self.repos.lock().unwrap();
        let state = repos.get(&canonical(repo)).ok_or_else(|| Self::missing(repo))?;
        Ok(Self::lookup(state, reference))
    }

    fn checkout(&self, repo: &Path, revision: &str) -> PoolResult<()> {
        let rev = self
            .resolve(repo, revision)?
            .unwrap_or_else(|| revision.to_string());
        let tree = self
            .snapshots
            .lock()
            .unwrap()
            .get(&rev)
            .cloned()
            .ok_or_else(|| PoolError::command_exec("fake-vcs checkout", "unknown revision"))?;

        for entry in fs::read_dir(repo).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                fs::remove_dir_all(&path).unwrap();
            } else {
                fs::remove_file(&path).unwrap();
            }
        }
        for entry in WalkDir::new(&tree).min_depth(1) {
            let entry = entry.unwrap();
            let dst = repo.join(entry.path().strip_prefix(&tree).unwrap());
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dst).unwrap();
            } else {
                fs::copy(entry.path(), &dst).unwrap();
            }
        }

        let mut repos = self.repos.lock().unwrap();
        repos.get_mut(&canonical(repo)).unwrap().head_rev = Some(rev);
        Ok(())
    }

    fn list_tags(&self, repo: &Path) -> PoolResult<Vec<String>> {
        let repos = self.repos.lock().unwrap();
        let state = repos.get(&canonical(repo)).ok_or_else(|| Self::missing(repo))?;
        let mut tags: Vec<String> = state
            .refs
            .keys()
            .filter_map(|name| name.strip_prefix("refs/tags/"))
            .map(str::to_string)
            .collect();
        tags.extend(state.broken_tags.iter().cloned());
        Ok(tags)
    }

    fn update_ref(&self, repo: &Path, name: &str, revision: &str) -> PoolResult<()> {
        let mut repos = self.repos.lock().unwrap();
        let state = repos
            .get_mut(&canonical(repo))
            .ok_or_else(|| Self::missing(repo))?;
        state.refs.insert(name.to_string(), revision.to_string());
        Ok(())
    }

    fn remove_ref(&self, repo: &Path, name: &str) -> PoolResult<()> {
        let mut repos = self.repos.lock().unwrap();
        let state = repos
            .get_mut(&canonical(repo))
            .ok_or_else(|| Self::missing(repo))?;
        state.refs.remove(name);
        Ok(())
    }

    fn current_symbolic_branch(&self, repo: &Path) -> PoolResult<Option<String>> {
        let repos = self.repos.lock().unwrap();
        let state = repos.get(&canonical(repo)).ok_or_else(|| Self::missing(repo))?;
        Ok(state.head_branch.clone())
    }
}

/// Fakes plus handles to inspect them
pub struct Fakes {
    pub vcs: Arc<FakeVcs>,
    pub versions: Arc<FakeVersions>,
    pub builder: Arc<FakeBuilder>,
}

impl Fakes {
    pub fn new() -> Self {
        Self::with_builder(FakeBuilder::default())
    }

    pub fn with_builder(builder: FakeBuilder) -> Self {
        Self {
            vcs: Arc::new(FakeVcs::default()),
            versions: Arc::new(FakeVersions::default()),
            builder: Arc::new(builder),
        }
    }

    pub fn backends(&self) -> Backends {
        Backends {
            vcs: self.vcs.clone(),
            versions: self.versions.clone(),
            builder: self.builder.clone(),
            reader: Arc::new(FakeReader),
        }
    }
}
