//! Transfer Session
//!
//! The collaborator that owns transfers and computes content identities. The
//! tree hands it paths and identities; the session answers asynchronously by
//! sending [`SessionEvent`]s on a channel that the tree's owner drains and
//! feeds back through [`crate::tree::ShareTree::handle_event`]. Nodes only
//! ever hold identity values, never transfer handles.

pub mod local;
pub mod scripted;

use crate::error::{ResolveError, TransferError};
use crate::types::{ContentId, RequestToken};
use std::path::{Path, PathBuf};

pub use local::LocalTransferSession;
pub use scripted::{ScriptedSession, SessionCall};

/// Result of a successful identity resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub identity: ContentId,
    pub size: u64,
}

/// Asynchronous notification from the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// An identity resolution finished, successfully or not
    ResolutionCompleted {
        token: RequestToken,
        result: Result<Resolution, ResolveError>,
    },
    /// A transfer for `path` finished and is now seeded
    TransferFinished { identity: ContentId, path: PathBuf },
    /// The session dropped a transfer on its own initiative
    TransferDeleted { identity: ContentId },
}

/// Operations the tree requires from the transfer session.
///
/// Every call returns immediately; results arrive later as events.
pub trait TransferSession: Send + Sync {
    /// Start computing the content identity of `path`.
    fn resolve_identity_async(&self, path: &Path) -> RequestToken;

    /// Cancel an in-flight resolution. A completion may still be delivered.
    fn cancel_resolution(&self, token: RequestToken);

    /// Register a transfer for already-resolved content.
    fn create_transfer(&self, identity: &ContentId, path: &Path) -> Result<(), TransferError>;

    /// Forget a transfer. With `keep_local_data` the file on disk is untouched.
    /// A deletion the caller asked for is not echoed as `TransferDeleted`.
    fn delete_transfer(&self, identity: &ContentId, keep_local_data: bool);
}
