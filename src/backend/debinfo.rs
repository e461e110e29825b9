//! Binary package metadata extraction
//!
//! `DpkgDeb` reads control fields with `dpkg-deb -f`. `CachedArtifactReader`
//! wraps any reader and memoizes results on disk, keyed by a SHA-256 of the
//! artifact's contents, so re-syncing a stock doesn't re-extract every
//! package.

use super::{exec_checked, ArtifactMetadata, ArtifactReader};
use crate::error::{PoolError, PoolResult};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Parse `Field: value` control text. Continuation lines are ignored.
pub fn parse_control_fields(control: &str) -> BTreeMap<String, String> {
    control
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with([' ', '\t']))
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Metadata from control text already extracted from `path`
pub fn metadata_from_control(path: &Path, control: &str) -> PoolResult<ArtifactMetadata> {
    metadata_from_fields(path, &parse_control_fields(control))
}

fn metadata_from_fields(
    path: &Path,
    fields: &BTreeMap<String, String>,
) -> PoolResult<ArtifactMetadata> {
    let field = |name: &str| {
        fields
            .get(name)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| PoolError::invalid_artifact(path, format!("missing {} field", name)))
    };

    // "Source: foo (1.2-1)" carries the source version when it differs
    let source = fields
        .get("Source")
        .and_then(|s| s.split_whitespace().next())
        .map(str::to_string);

    Ok(ArtifactMetadata {
        name: field("Package")?,
        version: field("Version")?,
        architecture: field("Architecture")?,
        source,
    })
}

/// `ArtifactReader` shelling out to dpkg-deb
pub struct DpkgDeb {
    program: String,
}

impl DpkgDeb {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ArtifactReader for DpkgDeb {
    fn read_metadata(&self, artifact: &Path) -> PoolResult<ArtifactMetadata> {
        let path = artifact.to_string_lossy();
        let control = exec_checked(&self.program, &["-f", path.as_ref()], None).map_err(|e| {
            PoolError::invalid_artifact(artifact, format!("can't read control fields: {}", e))
        })?;
        metadata_from_control(artifact, &control)
    }
}

/// Reads through an on-disk metadata cache
pub struct CachedArtifactReader {
    inner: Arc<dyn ArtifactReader>,
    dir: PathBuf,
}

impl CachedArtifactReader {
    pub fn new(inner: Arc<dyn ArtifactReader>, dir: PathBuf) -> Self {
        Self { inner, dir }
    }

    fn key(artifact: &Path) -> PoolResult<String> {
        let mut file = File::open(artifact)
            .map_err(|e| PoolError::io(format!("opening {}", artifact.display()), e))?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 65536];
        loop {
            let n = file
                .read(&mut buf)
                .map_err(|e| PoolError::io(format!("reading {}", artifact.display()), e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    fn entry(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn store(&self, key: &str, metadata: &ArtifactMetadata) -> PoolResult<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| PoolError::io(format!("creating {}", self.dir.display()), e))?;
        let content = serde_json::to_string(metadata)?;
        let path = self.entry(key);
        fs::write(&path, content)
            .map_err(|e| PoolError::io(format!("writing {}", path.display()), e))
    }
}

impl ArtifactReader for CachedArtifactReader {
    fn read_metadata(&self, artifact: &Path) -> PoolResult<ArtifactMetadata> {
        let key = Self::key(artifact)?;
        let entry = self.entry(&key);

        if let Ok(content) = fs::read_to_string(&entry) {
            match serde_json::from_str(&content) {
                Ok(metadata) => {
                    debug!("metadata cache hit for {}", artifact.display());
                    return Ok(metadata);
                }
                Err(e) => warn!("ignoring corrupt metadata cache entry {}: {}", entry.display(), e),
            }
        }

        let metadata = self.inner.read_metadata(artifact)?;
        if let Err(e) = self.store(&key, &metadata) {
            warn!("failed to cache metadata for {}: {}", artifact.display(), e);
        }
        Ok(metadata)
    }
}
