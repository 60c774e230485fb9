//! Error and warning types shared across the workspace.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Problems with a per-root configuration. Fatal for that root.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON.
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A path that must be absolute is not.
    #[error("{key} must be an absolute path, got {path}")]
    RelativePath { key: &'static str, path: PathBuf },

    /// A glob pattern failed to compile.
    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A permission string is not an octal mode.
    #[error("invalid permission string '{value}' (expected e.g. 664 or 0o664)")]
    Perm { value: String },

    /// The reorganize template does not fit the `/{year}/{month}/` shape.
    #[error("invalid reorganize template '{template}'")]
    Template { template: String },

    /// Ownership action enabled without owner_user/owner_group.
    #[error("the ownership action requires owner_user and owner_group")]
    MissingOwner,

    /// A configured account name does not resolve.
    #[error("unknown user '{name}'")]
    UnknownUser { name: String },

    /// A configured group name does not resolve.
    #[error("unknown group '{name}'")]
    UnknownGroup { name: String },
}

/// Fatal scan failures. Per-entry problems become [`ScanWarning`]s instead.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The scan root cannot be accessed at all.
    #[error("cannot access scan root {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scan root is not a directory.
    #[error("scan root is not a directory: {path}")]
    NotADirectory { path: PathBuf },
}

/// Kind of non-fatal problem hit while walking or hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// stat failed for an entry.
    Stat,
    /// readdir failed for a directory.
    ReadDir,
    /// Reading file bytes for hashing failed.
    Read,
}

/// A non-fatal problem, logged and carried in the scan model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the problem occurred.
    pub path: PathBuf,
    /// What went wrong.
    pub message: String,
    /// Problem category.
    pub kind: WarningKind,
}

impl ScanWarning {
    pub fn new(path: impl Into<PathBuf>, kind: WarningKind, error: &std::io::Error) -> Self {
        Self {
            path: path.into(),
            message: error.to_string(),
            kind,
        }
    }
}
