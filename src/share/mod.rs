//! Share/Unshare Engine
//!
//! Applies share and unshare commands to a subtree. Files under a shared
//! directory are always shared individually; child directories follow only
//! when the command is recursive, otherwise their collections are dropped so
//! they are rebuilt under the new ancestor chain.

pub mod events;

use crate::error::{ApiError, NodeError};
use crate::tree::{Node, NodeKind, ShareState, ShareTree};
use crate::types::{ContentId, NodeId};
use std::path::Path;
use tracing::{debug, info, warn};

impl ShareTree {
    /// Share a node. Files become Pending until their identity resolves;
    /// directories become Active immediately and cascade into their children.
    pub fn share(&mut self, id: NodeId, recursive: bool) -> Result<(), ApiError> {
        self.get(id)?;
        self.share_node(id, recursive);
        self.mark_chain_dirty(id);
        self.rebuild_dirty_collections();
        Ok(())
    }

    /// Unshare a node. Transfers are forgotten without touching file data and
    /// in-flight resolutions are canceled.
    pub fn unshare(&mut self, id: NodeId, recursive: bool) -> Result<(), ApiError> {
        self.get(id)?;
        self.unshare_node(id, recursive);
        self.mark_chain_dirty(id);
        self.rebuild_dirty_collections();
        Ok(())
    }

    pub fn share_path(&mut self, path: &Path, recursive: bool) -> Result<NodeId, ApiError> {
        let id = self.node_for_path(path)?;
        self.share(id, recursive)?;
        Ok(id)
    }

    pub fn unshare_path(&mut self, path: &Path, recursive: bool) -> Result<NodeId, ApiError> {
        let id = self.node_for_path(path)?;
        self.unshare(id, recursive)?;
        Ok(id)
    }

    /// Drop this directory's collection and those of every descendant
    /// directory, leaving share flags untouched.
    pub fn update_state(&mut self, id: NodeId) -> Result<(), ApiError> {
        self.get(id)?;
        self.update_state_node(id);
        self.rebuild_dirty_collections();
        Ok(())
    }

    fn share_node(&mut self, id: NodeId, recursive: bool) {
        match self.node(id).map(Node::is_dir) {
            Some(true) => self.share_dir(id, recursive),
            Some(false) => self.share_file(id),
            None => {}
        }
    }

    fn unshare_node(&mut self, id: NodeId, recursive: bool) {
        match self.node(id).map(Node::is_dir) {
            Some(true) => self.unshare_dir(id, recursive),
            Some(false) => self.unshare_file(id),
            None => {}
        }
    }

    pub(crate) fn share_file(&mut self, id: NodeId) {
        let Some(path) = self.path_of(id) else {
            return;
        };
        let Some(node) = self.node_mut(id) else {
            return;
        };
        if node.state.is_requested() {
            return;
        }
        node.state = ShareState::Pending;
        node.last_error = None;
        let cached = node.as_file().and_then(|f| f.resolved);

        match cached {
            Some(identity) => {
                debug!(node = %id, %identity, "Sharing file with cached identity");
                self.create_file_transfer(id, identity);
            }
            None => {
                let token = self.session.resolve_identity_async(&path);
                if let Some(file) = self.node_mut(id).and_then(Node::as_file_mut) {
                    file.request = Some(token);
                }
                self.requests.insert(token, id);
                debug!(node = %id, %token, "Requested identity resolution");
            }
        }

        self.invalidate_parent_collection(id);
        self.changed(id);
    }

    pub(crate) fn unshare_file(&mut self, id: NodeId) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        if node.state == ShareState::Inactive {
            return;
        }
        node.state = ShareState::Inactive;
        let transfer = node.transfer.take();
        let request = node.as_file_mut().and_then(|f| f.request.take());

        if let Some(identity) = transfer {
            self.transfers.remove(&identity);
            self.session.delete_transfer(&identity, true);
            debug!(node = %id, %identity, "Unshared file, transfer removed");
        }
        if let Some(token) = request {
            // the token stays in `requests` so a late result can still fill the cache
            self.session.cancel_resolution(token);
            debug!(node = %id, %token, "Unshared pending file, resolution canceled");
        }

        self.invalidate_parent_collection(id);
        self.changed(id);
    }

    fn share_dir(&mut self, id: NodeId, recursive: bool) {
        let newly_active = match self.node_mut(id) {
            Some(node) if node.state != ShareState::Active => {
                node.state = ShareState::Active;
                node.last_error = None;
                true
            }
            Some(_) => false,
            None => return,
        };
        if newly_active {
            debug!(node = %id, recursive, "Sharing directory");
        }

        if let Err(e) = self.populate(id) {
            warn!(node = %id, "Populate during share failed: {}", e);
        }

        let (files, dirs) = self.child_lists(id);
        for file in files {
            self.share_file(file);
        }
        for dir in dirs {
            if recursive {
                self.share_dir(dir, true);
            } else {
                self.update_state_node(dir);
            }
        }

        self.mark_dirty(id);
        self.changed(id);
    }

    fn unshare_dir(&mut self, id: NodeId, recursive: bool) {
        let was_active = match self.node_mut(id) {
            Some(node) if node.state == ShareState::Active => {
                node.state = ShareState::Inactive;
                true
            }
            Some(_) => false,
            None => return,
        };
        if was_active {
            debug!(node = %id, recursive, "Unsharing directory");
            self.drop_collection(id);
        }

        let (files, dirs) = self.child_lists(id);
        for file in files {
            self.unshare_file(file);
        }
        for dir in dirs {
            if recursive {
                self.unshare_dir(dir, true);
            } else if was_active {
                self.update_state_node(dir);
            }
        }

        self.changed(id);
    }

    fn update_state_node(&mut self, id: NodeId) {
        let has_collection = self
            .node(id)
            .and_then(|n| n.as_dir().map(|d| n.transfer.is_some() || d.collection.is_some()))
            .unwrap_or(false);
        if has_collection {
            self.drop_collection(id);
        }
        let (_, dirs) = self.child_lists(id);
        for dir in dirs {
            self.update_state_node(dir);
        }
    }

    /// Register a transfer for a resolved file. Success makes it Active;
    /// rejection records the error and abandons the share.
    pub(crate) fn create_file_transfer(&mut self, id: NodeId, identity: ContentId) {
        let Some(path) = self.path_of(id) else {
            return;
        };
        let result = self.session.create_transfer(&identity, &path);
        let Some(node) = self.node_mut(id) else {
            return;
        };
        match result {
            Ok(()) => {
                node.state = ShareState::Active;
                node.transfer = Some(identity);
                self.transfers.insert(identity, id);
                info!(node = %id, %identity, path = ?path, "File shared");
            }
            Err(e) => {
                warn!(node = %id, %identity, "Transfer creation failed: {}", e);
                node.state = ShareState::Inactive;
                node.last_error = Some(NodeError::TransferCreationFailure(e));
            }
        }
    }

    /// A file's membership changed: its parent's collection is stale.
    pub(crate) fn invalidate_parent_collection(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).and_then(|n| n.parent) {
            self.invalidate_collection(parent);
        }
    }

    /// Drop a directory's collection and notify the directory either way.
    pub(crate) fn invalidate_collection(&mut self, dir: NodeId) {
        if dir == self.root {
            return;
        }
        if !self.drop_collection(dir) {
            self.changed(dir);
        }
    }

    /// Snapshot of a directory's children, files and directories, in insertion order
    pub(crate) fn child_lists(&self, id: NodeId) -> (Vec<NodeId>, Vec<NodeId>) {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Directory(dir)) => (dir.file_order.clone(), dir.dir_order.clone()),
            _ => (Vec::new(), Vec::new()),
        }
    }
}
