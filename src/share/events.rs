//! Session callbacks: resolution completion and transfer lifecycle.
//!
//! Completions carry the token of the request they answer. A token that is
//! unknown, or no longer the node's current request, is stale: it never
//! changes share state or creates a transfer.

use crate::error::{NodeError, ResolveError};
use crate::session::Resolution;
use crate::tree::{Node, NodeKind, ShareState, ShareTree};
use crate::types::{ContentId, NodeId, RequestToken};
use std::path::Path;
use tracing::{debug, warn};

impl ShareTree {
    pub(crate) fn on_resolution_complete(
        &mut self,
        token: RequestToken,
        result: Result<Resolution, ResolveError>,
    ) {
        let Some(id) = self.requests.remove(&token) else {
            debug!(%token, "Ignoring completion for unknown request");
            return;
        };
        match self.node(id).map(Node::is_dir) {
            Some(true) => self.on_collection_resolved(id, token, result),
            Some(false) => self.on_file_resolved(id, token, result),
            None => debug!(%token, node = %id, "Ignoring completion for removed node"),
        }
    }

    fn on_file_resolved(
        &mut self,
        id: NodeId,
        token: RequestToken,
        result: Result<Resolution, ResolveError>,
    ) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let NodeKind::File(file) = &mut node.kind else {
            return;
        };

        if file.request != Some(token) {
            // canceled or superseded; a valid result still refreshes the
            // cache of a node that is no longer shared
            if let Ok(res) = &result {
                if file.request.is_none() && node.state == ShareState::Inactive {
                    file.resolved = Some(res.identity);
                    file.size = res.size;
                }
            }
            debug!(%token, node = %id, "Stale resolution ignored");
            return;
        }
        file.request = None;

        match result {
            Ok(res) => {
                file.resolved = Some(res.identity);
                file.size = res.size;
                node.last_error = None;
                if node.state == ShareState::Pending {
                    self.create_file_transfer(id, res.identity);
                }
            }
            Err(e) => {
                warn!(node = %id, "Content resolution failed: {}", e);
                file.resolved = None;
                node.state = ShareState::Inactive;
                node.last_error = Some(NodeError::ResolutionFailure(e));
            }
        }

        self.invalidate_parent_collection(id);
        self.changed(id);
    }

    /// A transfer completed for a path, possibly one the tree never asked for.
    pub(crate) fn on_transfer_finished(&mut self, identity: ContentId, path: &Path) {
        if self.transfers.contains_key(&identity) {
            debug!(%identity, "Finished transfer already registered");
            return;
        }
        let id = match self.node_for_path(path) {
            Ok(id) => id,
            Err(e) => {
                debug!(%identity, path = ?path, "No node for finished transfer: {}", e);
                return;
            }
        };
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let NodeKind::File(file) = &mut node.kind else {
            return;
        };
        let request = file.request.take();
        file.resolved = Some(identity);
        let previous = node.transfer.replace(identity);
        node.state = ShareState::Active;
        node.last_error = None;

        if let Some(token) = request {
            self.session.cancel_resolution(token);
        }
        if let Some(old) = previous {
            self.transfers.remove(&old);
        }
        self.transfers.insert(identity, id);
        debug!(node = %id, %identity, "Attached finished transfer");

        self.invalidate_parent_collection(id);
        self.changed(id);
    }

    /// The session dropped a transfer on its own.
    pub(crate) fn on_transfer_deleted(&mut self, identity: ContentId) {
        let Some(id) = self.transfers.remove(&identity) else {
            debug!(%identity, "Ignoring deletion of unregistered transfer");
            return;
        };
        let Some(node) = self.node_mut(id) else {
            return;
        };
        node.transfer = None;
        match &mut node.kind {
            NodeKind::File(file) => {
                file.resolved = None;
                node.state = ShareState::Inactive;
                debug!(node = %id, %identity, "File transfer deleted by session");
                self.invalidate_parent_collection(id);
            }
            NodeKind::Directory(dir) => {
                // left unset until the next membership change rebuilds it
                dir.collection = None;
                debug!(node = %id, %identity, "Collection transfer deleted by session");
            }
        }
        self.changed(id);
    }
}
