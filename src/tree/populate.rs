//! Lazy directory population and structural mutation.
//!
//! Every insert and remove is bracketed by begin/end notifications scoped to
//! the parent directory.

use super::node::{Node, NodeKind};
use super::{ShareTree, ShareState};
use crate::error::ApiError;
use crate::types::NodeId;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One enumerated directory entry
struct Entry {
    name: String,
    is_dir: bool,
    size: u64,
}

impl ShareTree {
    /// Enumerate the immediate children of a directory from storage.
    ///
    /// Idempotent: a populated directory is left alone, and entries already
    /// present are not duplicated. Returns the number of nodes created.
    /// Enumeration failure leaves the directory empty and unpopulated.
    pub fn populate(&mut self, id: NodeId) -> Result<usize, ApiError> {
        let node = self.get(id)?;
        let Some(dir) = node.as_dir() else {
            return Ok(0);
        };
        if dir.populated {
            return Ok(0);
        }

        let entries = if id == self.root {
            self.root_entries()
        } else {
            let path = self.path_of(id).ok_or(ApiError::InvalidNode(id))?;
            match enumerate(&path) {
                Some(entries) => entries,
                None => return Ok(0),
            }
        };

        let mut created = 0;
        for entry in entries {
            let exists = self
                .node(id)
                .and_then(Node::as_dir)
                .map(|dir| dir.child(&entry.name).is_some())
                .unwrap_or(true);
            if exists {
                continue;
            }
            let node = if entry.is_dir {
                Node::directory(entry.name, Some(id))
            } else {
                Node::file(entry.name, id, entry.size)
            };
            self.insert_child(id, node)?;
            created += 1;
        }

        if let Some(dir) = self.node_mut(id).and_then(Node::as_dir_mut) {
            dir.populated = true;
        }
        debug!(node = %id, created, "Populated directory");
        Ok(created)
    }

    /// Synthetic top-level entries: one directory per configured root, named
    /// by its full path.
    fn root_entries(&self) -> Vec<Entry> {
        self.roots
            .iter()
            .map(|root| Entry {
                name: root.to_string_lossy().into_owned(),
                is_dir: true,
                size: 0,
            })
            .collect()
    }

    /// Insert a node under `parent`, bracketed by insert notifications.
    pub(crate) fn insert_child(&mut self, parent: NodeId, mut node: Node) -> Result<NodeId, ApiError> {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        let is_dir = node.is_dir();
        let name = node.name.clone();

        let dir = self
            .node(parent)
            .and_then(Node::as_dir)
            .ok_or(ApiError::InvalidNode(parent))?;
        let position = if is_dir {
            dir.dir_order.len()
        } else {
            dir.child_count()
        };

        self.observer.begin_insert(parent, position);
        self.nodes.push(Some(node));
        if let Some(dir) = self.node_mut(parent).and_then(Node::as_dir_mut) {
            if is_dir {
                dir.dirs.insert(name, id);
                dir.dir_order.push(id);
            } else {
                dir.files.insert(name, id);
                dir.file_order.push(id);
            }
        }
        self.observer.end_insert();
        Ok(id)
    }

    /// Remove a node and its whole subtree from the tree.
    ///
    /// In-flight resolutions of the subtree are canceled and its transfers are
    /// forgotten by the session without touching file data. Removing a shared
    /// file invalidates its parent's collection.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), ApiError> {
        if id == self.root {
            return Err(ApiError::InvalidNode(id));
        }
        let node = self.get(id)?;
        let parent = node.parent;
        let was_shared_file = !node.is_dir() && node.state.is_requested();

        self.detach_subtree(id)?;

        if let Some(parent) = parent {
            if was_shared_file {
                self.invalidate_collection(parent);
            }
            self.mark_chain_dirty(parent);
        }
        self.rebuild_dirty_collections();
        Ok(())
    }

    /// Structural removal without collection re-evaluation.
    pub(crate) fn detach_subtree(&mut self, id: NodeId) -> Result<(), ApiError> {
        let parent = self.get(id)?.parent.ok_or(ApiError::InvalidNode(id))?;

        let mut subtree = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            subtree.push(cur);
            if let Some(dir) = self.node(cur).and_then(Node::as_dir) {
                stack.extend(dir.dir_order.iter().chain(dir.file_order.iter()).copied());
            }
        }

        for &cur in &subtree {
            self.release_node(cur);
        }
        self.requests.retain(|_, owner| !subtree.contains(owner));

        let position = self
            .node(parent)
            .and_then(Node::as_dir)
            .and_then(|dir| dir.position_of(id))
            .ok_or(ApiError::InvalidNode(id))?;

        self.observer.begin_remove(parent, position);
        let name = self.get(id)?.name.clone();
        if let Some(dir) = self.node_mut(parent).and_then(Node::as_dir_mut) {
            dir.dirs.remove(&name);
            dir.files.remove(&name);
            dir.dir_order.retain(|&child| child != id);
            dir.file_order.retain(|&child| child != id);
        }
        for &cur in &subtree {
            self.nodes[cur.0] = None;
        }
        self.dirty.retain(|d| !subtree.contains(d));
        self.observer.end_remove();
        Ok(())
    }

    /// Cancel and forget everything a node holds in the session.
    fn release_node(&mut self, id: NodeId) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let transfer = node.transfer.take();
        let is_dir = node.is_dir();
        let request = match &mut node.kind {
            NodeKind::File(file) => file.request.take(),
            NodeKind::Directory(dir) => dir.collection.take().and_then(|c| c.request),
        };
        node.state = ShareState::Inactive;

        if let Some(token) = request {
            self.session.cancel_resolution(token);
        }
        if let Some(identity) = transfer {
            self.transfers.remove(&identity);
            // collection manifests are generated data, shared files are not
            self.session.delete_transfer(&identity, !is_dir);
        }
    }
}

/// List the immediate children of `path`, sorted by name. `None` when the
/// directory itself cannot be read.
fn enumerate(path: &std::path::Path) -> Option<Vec<Entry>> {
    let mut entries = Vec::new();
    let walker = WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for result in walker {
        match result {
            Ok(entry) => {
                let file_type = entry.file_type();
                let name = entry.file_name().to_string_lossy().into_owned();
                if file_type.is_dir() {
                    entries.push(Entry {
                        name,
                        is_dir: true,
                        size: 0,
                    });
                } else if file_type.is_file() {
                    let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                    entries.push(Entry {
                        name,
                        is_dir: false,
                        size,
                    });
                }
            }
            Err(e) if e.depth() == 0 => {
                warn!(path = ?path, "Failed to enumerate directory: {}", e);
                return None;
            }
            Err(e) => {
                debug!(path = ?path, "Skipping unreadable entry: {}", e);
            }
        }
    }
    Some(entries)
}
