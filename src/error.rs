//! Error types for scenario folder import

use crate::file_type::FileTypeTag;
use crate::version::Version;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which keyed collection of the graph store an identifier belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Road,
    Junction,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Road => "road",
            EntityKind::Junction => "junction",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed document {}: {message}", .path.display())]
    MalformedDocument { path: PathBuf, message: String },

    #[error("no schema version declared in {}", .0.display())]
    VersionMissing(PathBuf),

    #[error("unparseable schema version {raw:?} in {}", .path.display())]
    VersionUnparseable { path: PathBuf, raw: String },

    #[error("{} declares version {found}, {tag} files need at least {minimum}", .path.display())]
    UnsupportedVersion {
        path: PathBuf,
        tag: FileTypeTag,
        found: Version,
        minimum: Version,
    },

    #[error("invalid version format: {0:?}")]
    InvalidVersionFormat(String),

    #[error("cannot merge {}: {reason}", .path.display())]
    IncompatibleMerge { path: PathBuf, reason: String },

    #[error("duplicate {kind} identifier {id:?}")]
    DuplicateIdentifier { kind: EntityKind, id: String },

    #[error("{kind} {id:?} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Structural and schema errors exclude one file; only a missing root stops an import
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DirectoryNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
