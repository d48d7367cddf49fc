//! Error types for the share tree.

use crate::types::{ContentId, NodeId};
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the tooling, configuration and tree lookup layers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Path is not part of any configured root: {}", .0.display())]
    UnknownPath(PathBuf),

    #[error("Node {0} no longer exists")]
    InvalidNode(NodeId),

    #[error("Collection error: {0}")]
    Collection(#[from] CollectionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure computing a content identity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("failed to read content: {0}")]
    Io(String),

    #[error("resolution canceled")]
    Canceled,

    #[error("not a regular file")]
    NotAFile,
}

impl From<std::io::Error> for ResolveError {
    fn from(err: std::io::Error) -> Self {
        ResolveError::Io(err.to_string())
    }
}

/// Rejection of a transfer creation by the session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("transfer {0} already exists")]
    Duplicate(ContentId),

    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// User-visible error recorded on a node by the last failed share attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("content resolution failed: {0}")]
    ResolutionFailure(#[from] ResolveError),

    #[error("transfer creation failed: {0}")]
    TransferCreationFailure(#[from] TransferError),
}

/// Errors producing or reading a collection manifest
#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("failed to write manifest {}: {source}", .path.display())]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read manifest {}: {source}", .path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
