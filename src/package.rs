//! Package identifiers and artifact filenames
//!
//! A package identifier is `name` or `name=version`. Version-less
//! identifiers are queries only; cache keys always carry a version.

use crate::error::{PoolError, PoolResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Suffixes of binary package artifacts
pub const BINARY_SUFFIXES: &[&str] = &["deb", "udeb"];

/// Suffix of build logs written by the builder
pub const BUILD_LOG_SUFFIX: &str = "build";

/// Suffix of build-metadata records written by the builder
pub const BUILD_INFO_SUFFIX: &str = "buildinfo";

const SOURCE_ARCHIVE_COMPRESSIONS: &[&str] = &["gz", "xz", "bz2"];

/// Relative path of the descriptor marking a source package directory
pub const SOURCE_DESCRIPTOR: &str = "debian/control";

/// A package identifier: `name[=version]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId {
    pub name: String,
    pub version: Option<String>,
}

impl PackageId {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    pub fn versioned(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }

    /// Parse `name` or `name=version`
    pub fn parse(s: &str) -> PoolResult<Self> {
        let (name, version) = match s.split_once('=') {
            Some((name, version)) => (name, Some(version.to_string())),
            None => (s, None),
        };
        if name.is_empty() || version.as_deref() == Some("") {
            return Err(PoolError::InvalidPackageId(s.to_string()));
        }
        Ok(Self::new(name, version))
    }

    /// Version, or `MissingVersion` if this is a query
    pub fn require_version(&self) -> PoolResult<&str> {
        self.version
            .as_deref()
            .ok_or_else(|| PoolError::MissingVersion(self.to_string()))
    }
}

impl FromStr for PackageId {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}={}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Format a fully resolved identifier
pub fn fmt_package_id(name: &str, version: &str) -> String {
    format!("{}={}", name, version)
}

/// What a file produced by a build (or found in a stock) is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// `.deb` / `.udeb`
    Binary,
    /// `.build`
    BuildLog,
    /// `.buildinfo`
    BuildInfo,
    /// `.tar.gz` / `.tar.xz` / `.tar.bz2`
    SourceArchive,
    Other,
}

impl ArtifactKind {
    /// Classify a filename by suffix
    pub fn classify(filename: &str) -> Self {
        let path = Path::new(filename);
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Self::Other;
        };

        if BINARY_SUFFIXES.contains(&ext) {
            return Self::Binary;
        }
        if ext == BUILD_LOG_SUFFIX {
            return Self::BuildLog;
        }
        if ext == BUILD_INFO_SUFFIX {
            return Self::BuildInfo;
        }
        if SOURCE_ARCHIVE_COMPRESSIONS.contains(&ext) {
            let inner = path
                .file_stem()
                .map(Path::new)
                .and_then(|stem| stem.extension())
                .and_then(|e| e.to_str());
            if inner == Some("tar") {
                return Self::SourceArchive;
            }
        }
        Self::Other
    }
}

/// True if `path` has a binary artifact suffix
pub fn is_binary_artifact(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| BINARY_SUFFIXES.contains(&ext))
}

/// Parse `name_version[_arch].deb` -> (name, version)
pub fn parse_package_filename(filename: &str) -> PoolResult<(String, String)> {
    if ArtifactKind::classify(filename) != ArtifactKind::Binary {
        return Err(PoolError::invalid_artifact(
            filename,
            "not a package".to_string(),
        ));
    }

    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let mut fields = stem.split('_');
    match (fields.next(), fields.next()) {
        (Some(name), Some(version)) if !name.is_empty() && !version.is_empty() => {
            Ok((name.to_string(), version.to_string()))
        }
        _ => Err(PoolError::invalid_artifact(
            filename,
            "expected <name>_<version>_<arch> filename".to_string(),
        )),
    }
}

/// Filename under which an artifact is stored in the package cache
pub fn cache_filename(name: &str, version: &str, arch: &str, suffix: &str) -> String {
    format!("{}_{}_{}.{}", name, version, arch, suffix)
}

/// Binary package names declared by a source package's `debian/control`
pub fn source_package_names(source_dir: &Path) -> PoolResult<Vec<String>> {
    let control = source_dir.join(SOURCE_DESCRIPTOR);
    let content = fs::read_to_string(&control)
        .map_err(|e| PoolError::io(format!("reading {}", control.display()), e))?;

    Ok(content
        .lines()
        .filter_map(|line| {
            let (field, value) = line.split_once(':')?;
            if field.trim().eq_ignore_ascii_case("package") {
                Some(value.trim().to_string())
            } else {
                None
            }
        })
        .filter(|name| !name.is_empty())
        .collect())
}

/// Directory of a package inside an archive-style tree (`lib?/name` or `n/name`)
pub fn tree_dir(name: &str) -> String {
    let prefix_len = if name.starts_with("lib") { 4 } else { 1 };
    let prefix: String = name.chars().take(prefix_len).collect();
    format!("{}/{}", prefix, name)
}
