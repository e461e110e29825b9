//! Error types for the pool
//!
//! All modules use `PoolResult<T>` as their return type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

/// All errors that can occur in the pool
#[derive(Error, Debug)]
pub enum PoolError {
    // Pool errors
    #[error("no pool found at {0}")]
    NotInitialized(PathBuf),

    #[error("pool already initialized at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("buildroot `{0}' is not a directory")]
    InvalidBuildRoot(PathBuf),

    #[error("invalid artifact {path}: {reason}")]
    InvalidArtifact { path: PathBuf, reason: String },

    // Registration errors
    #[error("stock already registered under name `{0}'")]
    AlreadyRegistered(String),

    #[error("no registered stock matches `{0}'")]
    NotFound(String),

    #[error("multiple registered stocks match `{0}'")]
    AmbiguousMatch(String),

    #[error("circular dependency detected: `{path}' is in recursed paths {recursed:?}")]
    CircularDependency { path: PathBuf, recursed: Vec<PathBuf> },

    #[error("no such branch `{branch}' at `{path}'")]
    NoSuchBranch { branch: String, path: PathBuf },

    #[error("invalid stock {path}: {reason}")]
    InvalidStock { path: PathBuf, reason: String },

    // Package errors
    #[error("explicit version required for `{0}'")]
    MissingVersion(String),

    #[error("can't resolve non-existent package `{0}'")]
    UnresolvablePackage(String),

    #[error("invalid version `{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("invalid package id `{0}'")]
    InvalidPackageId(String),

    #[error("no such package ({0})")]
    NoSuchPackage(String),

    #[error("no build log for {0}")]
    NoBuildLog(String),

    // Build errors
    #[error("{}", build_failed_message(.package, .preserved.as_ref()))]
    BuildFailed {
        package: String,
        preserved: Option<PathBuf>,
    },

    #[error("recently built package `{0}' missing from cache")]
    ArtifactMissingAfterBuild(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Worker protocol errors
    #[error("worker protocol error: {0}")]
    Protocol(String),

    #[error("{message}")]
    Remote { kind: ErrorKind, message: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

fn build_failed_message(package: &str, preserved: Option<&PathBuf>) -> String {
    match preserved {
        Some(dir) => format!(
            "package `{}' failed to build - build dir preserved for debugging: {}",
            package,
            dir.display()
        ),
        None => format!(
            "package `{}' failed to build - to preserve build dir, rerun with -d|--debug",
            package
        ),
    }
}

/// Serializable classification of a `PoolError`.
///
/// Used to carry an error's type across the worker boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotInitialized,
    AlreadyInitialized,
    InvalidBuildRoot,
    InvalidArtifact,
    AlreadyRegistered,
    NotFound,
    AmbiguousMatch,
    CircularDependency,
    NoSuchBranch,
    InvalidStock,
    MissingVersion,
    UnresolvablePackage,
    InvalidVersion,
    InvalidPackageId,
    NoSuchPackage,
    NoBuildLog,
    BuildFailed,
    ArtifactMissingAfterBuild,
    Config,
    Io,
    Command,
    Protocol,
    Serialization,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{:?}", self));
        write!(f, "{}", name)
    }
}

impl PoolError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create an invalid artifact error
    pub fn invalid_artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotInitialized(_) => ErrorKind::NotInitialized,
            Self::AlreadyInitialized(_) => ErrorKind::AlreadyInitialized,
            Self::InvalidBuildRoot(_) => ErrorKind::InvalidBuildRoot,
            Self::InvalidArtifact { .. } => ErrorKind::InvalidArtifact,
            Self::AlreadyRegistered(_) => ErrorKind::AlreadyRegistered,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AmbiguousMatch(_) => ErrorKind::AmbiguousMatch,
            Self::CircularDependency { .. } => ErrorKind::CircularDependency,
            Self::NoSuchBranch { .. } => ErrorKind::NoSuchBranch,
            Self::InvalidStock { .. } => ErrorKind::InvalidStock,
            Self::MissingVersion(_) => ErrorKind::MissingVersion,
            Self::UnresolvablePackage(_) => ErrorKind::UnresolvablePackage,
            Self::InvalidVersion { .. } => ErrorKind::InvalidVersion,
            Self::InvalidPackageId(_) => ErrorKind::InvalidPackageId,
            Self::NoSuchPackage(_) => ErrorKind::NoSuchPackage,
            Self::NoBuildLog(_) => ErrorKind::NoBuildLog,
            Self::BuildFailed { .. } => ErrorKind::BuildFailed,
            Self::ArtifactMissingAfterBuild(_) => ErrorKind::ArtifactMissingAfterBuild,
            Self::ConfigInvalid { .. } | Self::ConfigDirCreate { .. } => ErrorKind::Config,
            Self::Io { .. } => ErrorKind::Io,
            Self::CommandFailed { .. } | Self::CommandExecution { .. } => ErrorKind::Command,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Remote { kind, .. } => *kind,
            Self::Json(_) | Self::TomlParse(_) | Self::TomlSerialize(_) => {
                ErrorKind::Serialization
            }
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.kind() {
            ErrorKind::NotInitialized => {
                Some("Run: pool init <buildroot>, or point POOL_DIR at an existing pool")
            }
            ErrorKind::BuildFailed => Some("Inspect the build log with: pool info-build <package>"),
            ErrorKind::MissingVersion => Some("Use the form <name>=<version>"),
            ErrorKind::AmbiguousMatch => Some("Disambiguate with <path>#<branch>"),
            ErrorKind::ArtifactMissingAfterBuild => {
                Some("This is a bug; the builder reported success but produced no matching package")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PoolError::NotInitialized(PathBuf::from("/srv/pool"));
        assert!(err.to_string().contains("no pool found"));
    }

    #[test]
    fn error_hint() {
        let err = PoolError::MissingVersion("foo".to_string());
        assert_eq!(err.hint(), Some("Use the form <name>=<version>"));
        assert!(PoolError::NotFound("x".to_string()).hint().is_none());
    }

    #[test]
    fn build_failed_mentions_debug_flag_when_not_preserved() {
        let err = PoolError::BuildFailed {
            package: "foo=1.0".to_string(),
            preserved: None,
        };
        assert!(err.to_string().contains("--debug"));

        let err = PoolError::BuildFailed {
            package: "foo=1.0".to_string(),
            preserved: Some(PathBuf::from("/tmp/foo-1.0.x")),
        };
        assert!(err.to_string().contains("/tmp/foo-1.0.x"));
    }

    #[test]
    fn remote_error_keeps_kind_and_message() {
        let original = PoolError::AlreadyRegistered("stock#master".to_string());
        let remote = PoolError::Remote {
            kind: original.kind(),
            message: original.to_string(),
        };
        assert_eq!(remote.kind(), ErrorKind::AlreadyRegistered);
        assert_eq!(remote.to_string(), original.to_string());
    }

    #[test]
    fn kind_display_is_snake_case() {
        assert_eq!(ErrorKind::CircularDependency.to_string(), "circular_dependency");
    }
}
