//! Scripted session: an in-memory [`TransferSession`] whose resolutions are
//! completed by the caller. Records every call so cascades can be asserted
//! call by call.

use super::{Resolution, SessionEvent, TransferSession};
use crate::error::{ResolveError, TransferError};
use crate::types::{ContentId, RequestToken};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// One recorded session call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Resolve { token: RequestToken, path: PathBuf },
    Cancel(RequestToken),
    Create { identity: ContentId, path: PathBuf },
    Delete { identity: ContentId, keep_local_data: bool },
}

#[derive(Debug, Default)]
struct ScriptState {
    next_token: u64,
    calls: Vec<SessionCall>,
    outstanding: BTreeMap<RequestToken, PathBuf>,
    transfers: HashMap<ContentId, PathBuf>,
    rejected: Vec<ContentId>,
}

/// Deterministic session double.
///
/// `resolve_identity_async` only records the request; the caller decides when
/// and how it completes by building events with [`ScriptedSession::complete`]
/// or [`ScriptedSession::fail`].
#[derive(Debug, Default)]
pub struct ScriptedSession {
    state: Mutex<ScriptState>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Outstanding (not yet completed, not canceled) requests in issue order
    pub fn outstanding(&self) -> Vec<(RequestToken, PathBuf)> {
        self.state
            .lock()
            .outstanding
            .iter()
            .map(|(t, p)| (*t, p.clone()))
            .collect()
    }

    /// Token of the latest request issued for `path`
    pub fn token_for(&self, path: &Path) -> Option<RequestToken> {
        self.state
            .lock()
            .calls
            .iter()
            .rev()
            .find_map(|call| match call {
                SessionCall::Resolve { token, path: p } if p == path => Some(*token),
                _ => None,
            })
    }

    pub fn resolve_count(&self) -> usize {
        self.count(|c| matches!(c, SessionCall::Resolve { .. }))
    }

    pub fn create_count(&self) -> usize {
        self.count(|c| matches!(c, SessionCall::Create { .. }))
    }

    pub fn delete_count(&self) -> usize {
        self.count(|c| matches!(c, SessionCall::Delete { .. }))
    }

    pub fn cancel_count(&self) -> usize {
        self.count(|c| matches!(c, SessionCall::Cancel(_)))
    }

    fn count(&self, pred: impl Fn(&SessionCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn has_transfer(&self, identity: &ContentId) -> bool {
        self.state.lock().transfers.contains_key(identity)
    }

    pub fn transfer_count(&self) -> usize {
        self.state.lock().transfers.len()
    }

    /// Make the next `create_transfer` for `identity` fail.
    pub fn reject_next_create(&self, identity: ContentId) {
        self.state.lock().rejected.push(identity);
    }

    /// Successful completion event for `token`
    pub fn complete(&self, token: RequestToken, identity: ContentId, size: u64) -> SessionEvent {
        self.state.lock().outstanding.remove(&token);
        SessionEvent::ResolutionCompleted {
            token,
            result: Ok(Resolution { identity, size }),
        }
    }

    /// Failed completion event for `token`
    pub fn fail(&self, token: RequestToken, error: ResolveError) -> SessionEvent {
        self.state.lock().outstanding.remove(&token);
        SessionEvent::ResolutionCompleted {
            token,
            result: Err(error),
        }
    }
}

impl TransferSession for ScriptedSession {
    fn resolve_identity_async(&self, path: &Path) -> RequestToken {
        let mut state = self.state.lock();
        state.next_token += 1;
        let token = RequestToken(state.next_token);
        state.outstanding.insert(token, path.to_path_buf());
        state.calls.push(SessionCall::Resolve {
            token,
            path: path.to_path_buf(),
        });
        token
    }

    fn cancel_resolution(&self, token: RequestToken) {
        let mut state = self.state.lock();
        state.outstanding.remove(&token);
        state.calls.push(SessionCall::Cancel(token));
    }

    fn create_transfer(&self, identity: &ContentId, path: &Path) -> Result<(), TransferError> {
        let mut state = self.state.lock();
        state.calls.push(SessionCall::Create {
            identity: *identity,
            path: path.to_path_buf(),
        });
        if let Some(pos) = state.rejected.iter().position(|id| id == identity) {
            state.rejected.remove(pos);
            return Err(TransferError::Rejected("scripted rejection".to_string()));
        }
        if state.transfers.contains_key(identity) {
            return Err(TransferError::Duplicate(*identity));
        }
        state.transfers.insert(*identity, path.to_path_buf());
        Ok(())
    }

    fn delete_transfer(&self, identity: &ContentId, keep_local_data: bool) {
        let mut state = self.state.lock();
        state.transfers.remove(identity);
        state.calls.push(SessionCall::Delete {
            identity: *identity,
            keep_local_data,
        });
    }
}
