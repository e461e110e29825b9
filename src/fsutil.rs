//! Filesystem helpers shared by the cache, stocks and kernel

use crate::error::{PoolError, PoolResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Create a directory and its parents, tolerating existence
pub fn ensure_dir(path: &Path) -> PoolResult<()> {
    fs::create_dir_all(path)
        .map_err(|e| PoolError::io(format!("creating directory {}", path.display()), e))
}

/// Remove a directory tree if present
pub fn remove_tree(path: &Path) -> PoolResult<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PoolError::io(format!("removing {}", path.display()), e)),
    }
}

/// Discard a directory tree and recreate it empty
pub fn recreate_dir(path: &Path) -> PoolResult<()> {
    remove_tree(path)?;
    ensure_dir(path)
}

/// Hardlink `src` to `dst`, falling back to a byte copy across filesystems.
///
/// An existing `dst` is replaced. `src` is never modified.
pub fn hardlink_or_copy(src: &Path, dst: &Path) -> PoolResult<()> {
    if dst.symlink_metadata().is_ok() {
        fs::remove_file(dst)
            .map_err(|e| PoolError::io(format!("removing {}", dst.display()), e))?;
    }

    match fs::hard_link(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
            debug!("cross-device link {} -> {}, copying", src.display(), dst.display());
            fs::copy(src, dst).map(|_| ()).map_err(|e| {
                PoolError::io(format!("copying {} to {}", src.display(), dst.display()), e)
            })
        }
        Err(e) => Err(PoolError::io(
            format!("linking {} to {}", src.display(), dst.display()),
            e,
        )),
    }
}

/// Copy a file into a directory, keeping its name
pub fn copy_into(src: &Path, dir: &Path) -> PoolResult<PathBuf> {
    let name = src
        .file_name()
        .ok_or_else(|| PoolError::io(format!("no filename in {}", src.display()), not_found()))?;
    let dst = dir.join(name);
    fs::copy(src, &dst)
        .map_err(|e| PoolError::io(format!("copying {} to {}", src.display(), dst.display()), e))?;
    Ok(dst)
}

/// Read a single trimmed line, `None` if the file is absent
pub fn read_line(path: &Path) -> PoolResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let line = content.trim();
            Ok((!line.is_empty()).then(|| line.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PoolError::io(format!("reading {}", path.display()), e)),
    }
}

/// Replace `path` with a single line, atomically via rename
pub fn write_line_atomic(path: &Path, line: &str) -> PoolResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| PoolError::io(format!("creating temporary file in {}", dir.display()), e))?;
    writeln!(tmp, "{}", line)
        .map_err(|e| PoolError::io(format!("writing {}", path.display()), e))?;
    tmp.persist(path)
        .map_err(|e| PoolError::io(format!("replacing {}", path.display()), e.error))?;
    Ok(())
}

/// Remove a file if present
pub fn remove_file_if_exists(path: &Path) -> PoolResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PoolError::io(format!("removing {}", path.display()), e)),
    }
}

/// Canonical form of a path, or the path itself if it can't be resolved
pub fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn not_found() -> std::io::Error {
    std::io::Error::from(std::io::ErrorKind::NotFound)
}
