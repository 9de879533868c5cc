//! Error taxonomy for the persistence core.
//!
//! I/O failures carry the operation and path that failed so callers can
//! surface a human-readable reason. Validation failures fail fast with no
//! side effects. Nothing here is fatal to the process.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by map, sidecar, and folder operations.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("{op} failed for {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sidecar write failed for {path}: {message}")]
    Sidecar { path: PathBuf, message: String },

    #[error("field {field:?} in {path} does not hold an array")]
    NotAnArray { field: String, path: PathBuf },

    #[error("invalid node name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("{parent:?} has no child named {name:?}")]
    UnknownChild { parent: String, name: String },

    #[error("sibling named {name:?} already exists under {parent}")]
    SiblingExists { parent: PathBuf, name: String },

    #[error("node reference is no longer alive")]
    DeadNode,

    #[error("connection reference is no longer alive")]
    DeadConnection,

    #[error("a node cannot be connected to itself")]
    SelfConnection,

    #[error("the root node cannot be {0}")]
    RootImmutable(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl MapError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MapError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MapError>;
