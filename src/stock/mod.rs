//! Stocks: the package sources registered in a pool
//!
//! Each registered stock is a directory `stocks/<name>/` holding a `link`
//! symlink to its target. A target that is itself a pool becomes a
//! [`StockPool`]; anything else is a leaf [`Stock`] with its own derived
//! index. [`Stocks`] is the aggregate over one pool's stock directory.

mod index;
mod leaf;
mod registry;
mod subpool;

pub use index::StockIndex;
pub use leaf::Stock;
pub use registry::Stocks;
pub use subpool::StockPool;

use crate::error::{PoolError, PoolResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const ESCAPED_SLASH: &str = "%2F";

/// Encode a branch name for use inside a stock directory name
pub fn escape_branch(branch: &str) -> String {
    branch.replace('/', ESCAPED_SLASH)
}

/// Decode a branch name taken from a stock directory name
pub fn unescape_branch(branch: &str) -> String {
    branch.replace(ESCAPED_SLASH, "/")
}

/// A parsed `path[#branch]` stock reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRef {
    /// Absolute path of the stock target
    pub path: PathBuf,
    /// Branch, unescaped
    pub branch: Option<String>,
}

impl StockRef {
    pub fn parse(reference: &str) -> PoolResult<Self> {
        let (dir, branch) = match reference.split_once('#') {
            Some((dir, branch)) => (dir, Some(branch)),
            None => (reference, None),
        };
        if dir.is_empty() {
            return Err(PoolError::InvalidStock {
                path: PathBuf::from(reference),
                reason: "empty stock path".to_string(),
            });
        }

        let path = std::path::absolute(dir)
            .map_err(|e| PoolError::io(format!("resolving {}", dir), e))?;
        Ok(Self {
            path,
            branch: branch.filter(|b| !b.is_empty()).map(str::to_string),
        })
    }

    /// Stock directory name for this reference: `basename[#escaped-branch]`
    pub fn stock_name(&self) -> String {
        let base = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string());
        match &self.branch {
            Some(branch) => format!("{}#{}", base, escape_branch(branch)),
            None => base,
        }
    }
}

/// What every stock kind shares: its directory, name and link target
#[derive(Debug, Clone)]
pub struct StockBase {
    pub root: PathBuf,
    pub name: String,
    pub link: PathBuf,
}

impl StockBase {
    /// Create `root` with a `link` symlink pointing at `target`
    pub fn create(root: &Path, target: &Path) -> PoolResult<()> {
        debug!("creating stock {} -> {}", root.display(), target.display());
        fs::create_dir_all(root)
            .map_err(|e| PoolError::io(format!("creating {}", root.display()), e))?;
        let link = root.join("link");
        std::os::unix::fs::symlink(target, &link)
            .map_err(|e| PoolError::io(format!("linking {}", link.display()), e))
    }

    /// Read a stock directory, validating its link
    pub fn open(root: &Path) -> PoolResult<Self> {
        let invalid = |reason: String| PoolError::InvalidStock {
            path: root.to_path_buf(),
            reason,
        };

        let link_path = root.join("link");
        let link = fs::read_link(&link_path)
            .map_err(|e| invalid(format!("can't read stock link: {}", e)))?;
        if !link.is_dir() {
            return Err(invalid(format!(
                "stock link to non-directory `{}'",
                link.display()
            )));
        }

        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| invalid("stock directory has no name".to_string()))?;

        Ok(Self {
            root: root.to_path_buf(),
            name,
            link,
        })
    }

    /// Tracked branch, still escaped as in the stock name
    pub fn branch(&self) -> Option<&str> {
        self.name.split_once('#').map(|(_, branch)| branch)
    }

    /// `link[#branch]` with the branch unescaped
    pub fn reference(&self) -> String {
        match self.branch() {
            Some(branch) => format!("{}#{}", self.link.display(), unescape_branch(branch)),
            None => self.link.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_reference_with_branch() {
        let r = StockRef::parse("/srv/repos/foo#feature/x").unwrap();
        assert_eq!(r.path, PathBuf::from("/srv/repos/foo"));
        assert_eq!(r.branch.as_deref(), Some("feature/x"));
        assert_eq!(r.stock_name(), "foo#feature%2Fx");
    }

    #[test]
    fn parse_reference_without_branch() {
        let r = StockRef::parse("/srv/repos/foo").unwrap();
        assert!(r.branch.is_none());
        assert_eq!(r.stock_name(), "foo");

        let r = StockRef::parse("/srv/repos/foo#").unwrap();
        assert!(r.branch.is_none());
    }

    #[test]
    fn relative_reference_is_absolutized() {
        let r = StockRef::parse("foo").unwrap();
        assert!(r.path.is_absolute());
        assert!(r.path.ends_with("foo"));
    }

    #[test]
    fn branch_escaping_roundtrip() {
        assert_eq!(escape_branch("a/b/c"), "a%2Fb%2Fc");
        assert_eq!(unescape_branch("a%2Fb%2Fc"), "a/b/c");
    }

    #[test]
    fn open_rejects_broken_link() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("stock");
        StockBase::create(&root, &dir.path().join("missing")).unwrap();

        let err = StockBase::open(&root).unwrap_err();
        assert!(matches!(err, PoolError::InvalidStock { .. }));
    }

    #[test]
    fn base_reference_decodes_branch() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("repo");
        fs::create_dir(&target).unwrap();
        let root = dir.path().join("repo#release%2F1.0");
        StockBase::create(&root, &target).unwrap();

        let base = StockBase::open(&root).unwrap();
        assert_eq!(base.branch(), Some("release%2F1.0"));
        assert_eq!(base.reference(), format!("{}#release/1.0", target.display()));
    }
}
