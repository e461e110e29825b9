//! External collaborators
//!
//! The pool never compiles, parses or checks out anything itself. Version
//! control, version listing/seeking, building and package metadata
//! extraction are delegated to the traits below, implemented by the
//! command-line tools in the submodules:
//! - `git` for version-control-backed stocks
//! - `verseek` for listing and seeking source versions
//! - `deckdebuild` for building inside a buildroot
//! - `dpkg-deb` for reading binary package control fields

mod builder;
mod debinfo;
mod factory;
mod git;
mod verseek;

pub use builder::DeckDebuild;
pub use debinfo::{metadata_from_control, parse_control_fields, CachedArtifactReader, DpkgDeb};
pub use factory::create_backends;
pub use git::Git;
pub use verseek::Verseek;

use crate::error::{PoolError, PoolResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;
use tracing::debug;

/// Control metadata embedded in a binary package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub name: String,
    pub version: String,
    pub architecture: String,
    /// Source package name, when it differs from the binary name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Options passed to the builder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Keep the build chroot around for debugging
    pub preserve: bool,
    /// Produce a source package in addition to binaries
    pub build_source: bool,
}

/// Version-control operations on a repository at a given path
pub trait Vcs: Send + Sync {
    /// True if `path` is a repository this backend can operate on
    fn is_repository(&self, path: &Path) -> bool;

    /// Create an empty repository at `checkout` borrowing objects from `objects_from`
    fn init_checkout(&self, checkout: &Path, objects_from: &Path) -> PoolResult<()>;

    /// Revision a reference points at, `None` if it doesn't resolve
    fn resolve(&self, repo: &Path, reference: &str) -> PoolResult<Option<String>>;

    /// Force-checkout a revision or branch into the repository's worktree
    fn checkout(&self, repo: &Path, revision: &str) -> PoolResult<()>;

    /// Tag names
    fn list_tags(&self, repo: &Path) -> PoolResult<Vec<String>>;

    /// Point a fully qualified ref at a revision
    fn update_ref(&self, repo: &Path, name: &str, revision: &str) -> PoolResult<()>;

    /// Delete a fully qualified ref
    fn remove_ref(&self, repo: &Path, name: &str) -> PoolResult<()>;

    /// Branch HEAD points at, `None` when detached
    fn current_symbolic_branch(&self, repo: &Path) -> PoolResult<Option<String>>;
}

/// Lists and seeks the versions a source tree can be materialized at
pub trait SourceVersions: Send + Sync {
    fn list_versions(&self, source_dir: &Path) -> PoolResult<Vec<String>>;

    /// Seek to `version`, or back to the unversioned state when `None`
    fn seek(&self, source_dir: &Path, version: Option<&str>) -> PoolResult<()>;
}

/// Compiles a source tree into binary artifacts
pub trait PackageBuilder: Send + Sync {
    /// Build `source_dir` inside `buildroot`, writing artifacts to `output_dir`.
    ///
    /// `Ok(false)` means the builder ran and reported failure.
    fn build(
        &self,
        source_dir: &Path,
        buildroot: &Path,
        output_dir: &Path,
        options: BuildOptions,
    ) -> PoolResult<bool>;
}

/// Extracts control metadata from a binary package
pub trait ArtifactReader: Send + Sync {
    fn read_metadata(&self, artifact: &Path) -> PoolResult<ArtifactMetadata>;
}

/// The set of collaborators a kernel is opened with
#[derive(Clone)]
pub struct Backends {
    pub vcs: Arc<dyn Vcs>,
    pub versions: Arc<dyn SourceVersions>,
    pub builder: Arc<dyn PackageBuilder>,
    pub reader: Arc<dyn ArtifactReader>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

fn describe(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a program to completion, capturing its output
pub(crate) fn exec(program: &str, args: &[&str], cwd: Option<&Path>) -> PoolResult<Output> {
    debug!("Executing: {}", describe(program, args));

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    command
        .output()
        .map_err(|e| PoolError::command_failed(describe(program, args), e))
}

/// Run a program and return its stdout, failing on a non-zero exit
pub(crate) fn exec_checked(program: &str, args: &[&str], cwd: Option<&Path>) -> PoolResult<String> {
    let output = exec(program, args, cwd)?;
    if !output.status.success() {
        return Err(PoolError::command_exec(
            describe(program, args),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a program with its stdout redirected to our stderr.
///
/// Our stdout may be a protocol channel, so child output never goes there.
pub(crate) fn exec_passthrough(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
) -> PoolResult<bool> {
    debug!("Executing: {}", describe(program, args));

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(std::io::stderr()))
        .stderr(Stdio::inherit());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let status = command
        .status()
        .map_err(|e| PoolError::command_failed(describe(program, args), e))?;
    Ok(status.success())
}
