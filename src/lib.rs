//! Sharetree: live share-state tree over local files
//!
//! Mirrors configured filesystem roots as a lazily populated tree of nodes,
//! each carrying a share state. Sharing a file resolves its content identity
//! through a [`session::TransferSession`] and registers a transfer; sharing a
//! directory also derives a collection manifest of its shared files once all
//! of them are registered.

pub mod collection;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod session;
pub mod share;
pub mod tooling;
pub mod tree;
pub mod types;

pub use error::{ApiError, CollectionError, NodeError, ResolveError, TransferError};
pub use notify::{ChangeEvent, ChangeObserver, NullObserver, RecordingObserver};
pub use session::{LocalTransferSession, Resolution, ScriptedSession, SessionEvent, TransferSession};
pub use tree::{Node, NodeKind, ShareState, ShareTree};
pub use types::{ContentId, NodeId, RequestToken};
