//! verseek command-line backend

use super::{exec_checked, exec_passthrough, SourceVersions};
use crate::error::{PoolError, PoolResult};
use std::path::Path;

/// `SourceVersions` implementation shelling out to verseek
pub struct Verseek {
    program: String,
}

impl Verseek {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl SourceVersions for Verseek {
    fn list_versions(&self, source_dir: &Path) -> PoolResult<Vec<String>> {
        let dir = source_dir.to_string_lossy();
        let out = exec_checked(&self.program, &["-l", dir.as_ref()], None)?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn seek(&self, source_dir: &Path, version: Option<&str>) -> PoolResult<()> {
        let dir = source_dir.to_string_lossy();
        let mut args = vec![dir.as_ref()];
        args.extend(version);

        if exec_passthrough(&self.program, &args, None)? {
            Ok(())
        } else {
            Err(PoolError::command_exec(
                format!("{} {}", self.program, args.join(" ")),
                "seek failed",
            ))
        }
    }
}
