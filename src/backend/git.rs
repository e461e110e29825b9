//! Git command-line backend

use super::{exec, exec_checked, Vcs};
use crate::error::{PoolError, PoolResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `Vcs` implementation shelling out to git
pub struct Git {
    program: String,
}

impl Git {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, repo: &Path, args: &[&str]) -> PoolResult<String> {
        let repo = repo.to_string_lossy();
        let mut full = vec!["-C", repo.as_ref()];
        full.extend_from_slice(args);
        exec_checked(&self.program, &full, None)
    }

    /// Run and report success without treating failure as an error
    fn probe(&self, repo: &Path, args: &[&str]) -> PoolResult<Option<String>> {
        let repo = repo.to_string_lossy();
        let mut full = vec!["-C", repo.as_ref()];
        full.extend_from_slice(args);
        let output = exec(&self.program, &full, None)?;
        if !output.status.success() {
            return Ok(None);
        }
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!stdout.is_empty()).then_some(stdout))
    }

    fn git_dir(&self, repo: &Path) -> PoolResult<PathBuf> {
        let dir = self.run(repo, &["rev-parse", "--absolute-git-dir"])?;
        Ok(PathBuf::from(dir.trim()))
    }
}

impl Default for Git {
    fn default() -> Self {
        Self::new("git")
    }
}

impl Vcs for Git {
    fn is_repository(&self, path: &Path) -> bool {
        path.is_dir()
            && self
                .probe(path, &["rev-parse", "--git-dir"])
                .ok()
                .flatten()
                .is_some()
    }

    fn init_checkout(&self, checkout: &Path, objects_from: &Path) -> PoolResult<()> {
        let checkout_str = checkout.to_string_lossy();
        exec_checked(&self.program, &["init", "-q", checkout_str.as_ref()], None)?;

        let source_objects = self.git_dir(objects_from)?.join("objects");
        let info = self.git_dir(checkout)?.join("objects").join("info");
        fs::create_dir_all(&info).map_err(|e| {
            PoolError::io(format!("creating {}", info.display()), e)
        })?;
        let alternates = info.join("alternates");
        fs::write(&alternates, format!("{}\n", source_objects.display())).map_err(|e| {
            PoolError::io(format!("writing {}", alternates.display()), e)
        })?;

        debug!(
            "initialized checkout {} borrowing objects from {}",
            checkout.display(),
            source_objects.display()
        );
        Ok(())
    }

    fn resolve(&self, repo: &Path, reference: &str) -> PoolResult<Option<String>> {
        self.probe(repo, &["rev-parse", "--verify", "-q", reference])
    }

    fn checkout(&self, repo: &Path, revision: &str) -> PoolResult<()> {
        self.run(repo, &["checkout", "-q", "-f", revision]).map(|_| ())
    }

    fn list_tags(&self, repo: &Path) -> PoolResult<Vec<String>> {
        let out = self.run(repo, &["tag", "--list"])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn update_ref(&self, repo: &Path, name: &str, revision: &str) -> PoolResult<()> {
        self.run(repo, &["update-ref", name, revision]).map(|_| ())
    }

    fn remove_ref(&self, repo: &Path, name: &str) -> PoolResult<()> {
        self.run(repo, &["update-ref", "-d", name]).map(|_| ())
    }

    fn current_symbolic_branch(&self, repo: &Path) -> PoolResult<Option<String>> {
        self.probe(repo, &["symbolic-ref", "-q", "--short", "HEAD"])
    }
}
