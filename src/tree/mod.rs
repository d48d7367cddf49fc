//! Share Tree
//!
//! Arena-owned mirror of the local filesystem. A virtual root owns one
//! top-level directory per configured filesystem root; every directory owns
//! its children, and each child keeps only the [`NodeId`] of its parent.
//!
//! All mutation goes through `&mut ShareTree`, so the tree has exactly one
//! owner. Session results arrive as [`SessionEvent`]s that the owner feeds to
//! [`ShareTree::handle_event`] on its own thread.

pub mod hasher;
pub mod node;
pub mod populate;

use crate::collection::CollectionStore;
use crate::error::ApiError;
use crate::notify::{ChangeObserver, NullObserver};
use crate::session::{SessionEvent, TransferSession};
use crate::types::{ContentId, NodeId, RequestToken};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use node::{CollectionRef, DirectoryNode, FileNode, Node, NodeKind, ShareState};

/// The node tree and its share/transfer bookkeeping
pub struct ShareTree {
    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) root: NodeId,
    pub(crate) roots: Vec<PathBuf>,
    pub(crate) session: Arc<dyn TransferSession>,
    pub(crate) observer: Box<dyn ChangeObserver>,
    /// In-flight resolutions by token, including canceled ones whose late
    /// completion may still refresh a file's cached identity
    pub(crate) requests: HashMap<RequestToken, NodeId>,
    /// Transfers this tree registered, by identity
    pub(crate) transfers: HashMap<ContentId, NodeId>,
    pub(crate) collections: CollectionStore,
    /// Directories whose collection must be re-evaluated
    pub(crate) dirty: Vec<NodeId>,
}

impl ShareTree {
    /// Create a tree over `roots`, writing collections into `collection_dir`.
    pub fn new(
        roots: Vec<PathBuf>,
        collection_dir: PathBuf,
        session: Arc<dyn TransferSession>,
    ) -> Self {
        let roots = roots.into_iter().map(|r| canonical(&r)).collect();
        Self {
            nodes: vec![Some(Node::directory(String::new(), None))],
            root: NodeId(0),
            roots,
            session,
            observer: Box::new(NullObserver),
            requests: HashMap::new(),
            transfers: HashMap::new(),
            collections: CollectionStore::new(collection_dir),
            dirty: Vec::new(),
        }
    }

    /// Replace the change observer.
    pub fn with_observer(mut self, observer: Box<dyn ChangeObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The virtual root owning one directory per configured root
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        id == self.root
    }

    pub fn collection_store(&self) -> &CollectionStore {
        &self.collections
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|slot| slot.as_ref())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(|slot| slot.as_mut())
    }

    /// Node lookup that reports a removed or unknown id as an error
    pub fn get(&self, id: NodeId) -> Result<&Node, ApiError> {
        self.node(id).ok_or(ApiError::InvalidNode(id))
    }

    /// Number of live nodes, the virtual root included
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Resolutions the tree is still waiting on
    pub fn in_flight(&self) -> usize {
        self.requests.len()
    }

    /// Node registered for a transfer identity
    pub fn node_for_transfer(&self, identity: &ContentId) -> Option<NodeId> {
        self.transfers.get(identity).copied()
    }

    /// Children of a directory in row order: directories, then files
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match self.node(id).and_then(Node::as_dir) {
            Some(dir) => dir.dir_order.iter().chain(dir.file_order.iter()).copied().collect(),
            None => Vec::new(),
        }
    }

    /// Absolute filesystem path of a node. The virtual root maps to an empty path.
    pub fn path_of(&self, id: NodeId) -> Option<PathBuf> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            if cur == self.root {
                break;
            }
            let node = self.node(cur)?;
            names.push(node.name.as_str());
            current = node.parent;
        }
        let mut path = PathBuf::new();
        for name in names.iter().rev() {
            path.push(name);
        }
        Some(path)
    }

    /// Depth below the top-level root directories
    pub fn level(&self, id: NodeId) -> usize {
        let mut level = 0usize;
        let mut current = self.node(id).and_then(|n| n.parent);
        while let Some(cur) = current {
            if cur == self.root {
                break;
            }
            level += 1;
            current = self.node(cur).and_then(|n| n.parent);
        }
        level.saturating_sub(1)
    }

    /// Resolve a filesystem path to its node, populating directories on the way.
    pub fn node_for_path(&mut self, path: &Path) -> Result<NodeId, ApiError> {
        let path = canonical(path);
        let (root_path, top) = self.top_level_for(&path)?;
        let rest = path
            .strip_prefix(&root_path)
            .map_err(|_| ApiError::UnknownPath(path.clone()))?
            .to_path_buf();

        let mut current = top;
        for component in rest.components() {
            let name = component.as_os_str().to_string_lossy();
            self.populate(current)?;
            current = self
                .node(current)
                .and_then(Node::as_dir)
                .and_then(|dir| dir.child(&name))
                .ok_or_else(|| ApiError::UnknownPath(path.clone()))?;
        }
        Ok(current)
    }

    /// Resolve a path only through nodes that already exist
    pub fn find_existing(&self, path: &Path) -> Option<NodeId> {
        let path = canonical(path);
        let root_path = self.matching_root(&path)?;
        let root_dir = self.node(self.root)?.as_dir()?;
        let mut current = root_dir.child(&root_path.to_string_lossy())?;
        for component in path.strip_prefix(&root_path).ok()?.components() {
            let name = component.as_os_str().to_string_lossy();
            current = self.node(current)?.as_dir()?.child(&name)?;
        }
        Some(current)
    }

    fn matching_root(&self, path: &Path) -> Option<PathBuf> {
        self.roots
            .iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
            .cloned()
    }

    fn top_level_for(&mut self, path: &Path) -> Result<(PathBuf, NodeId), ApiError> {
        let root_path = self
            .matching_root(path)
            .ok_or_else(|| ApiError::UnknownPath(path.to_path_buf()))?;
        let root = self.root;
        self.populate(root)?;
        let top = self
            .node(root)
            .and_then(Node::as_dir)
            .and_then(|dir| dir.child(&root_path.to_string_lossy()))
            .ok_or_else(|| ApiError::UnknownPath(path.to_path_buf()))?;
        Ok((root_path, top))
    }

    /// True if this node or any descendant is Active.
    pub fn contains_active_children(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if node.is_active() {
            return true;
        }
        match &node.kind {
            NodeKind::File(_) => false,
            NodeKind::Directory(dir) => dir
                .file_order
                .iter()
                .chain(dir.dir_order.iter())
                .any(|&child| self.contains_active_children(child)),
        }
    }

    /// True only if this node is Active, every descendant file is Active and
    /// every descendant directory is populated and fully active.
    pub fn all_active_children(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if !node.is_active() {
            return false;
        }
        match &node.kind {
            NodeKind::File(_) => true,
            NodeKind::Directory(dir) => {
                dir.file_order.iter().all(|&f| self.all_active_children(f))
                    && dir.dir_order.iter().all(|&d| {
                        self.node(d)
                            .and_then(Node::as_dir)
                            .map(DirectoryNode::is_populated)
                            .unwrap_or(false)
                            && self.all_active_children(d)
                    })
            }
        }
    }

    /// Names of files left unshared inside an active directory
    pub fn excluded_files(&self, id: NodeId) -> Vec<String> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        let Some(dir) = node.as_dir() else {
            return Vec::new();
        };
        if !node.is_active() {
            return Vec::new();
        }
        dir.file_order
            .iter()
            .filter_map(|&f| self.node(f))
            .filter(|f| !f.state.is_requested())
            .map(|f| f.name.clone())
            .collect()
    }

    /// Apply one session event, then re-evaluate affected collections.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ResolutionCompleted { token, result } => {
                self.on_resolution_complete(token, result)
            }
            SessionEvent::TransferFinished { identity, path } => {
                self.on_transfer_finished(identity, &path)
            }
            SessionEvent::TransferDeleted { identity } => self.on_transfer_deleted(identity),
        }
        self.rebuild_dirty_collections();
    }

    /// Apply every event already waiting on `events`. Returns how many were handled.
    pub fn pump(&mut self, events: &mpsc::Receiver<SessionEvent>) -> usize {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Apply events until no resolution is in flight or `timeout` elapses.
    /// Returns whether the tree settled.
    pub fn run_until_settled(
        &mut self,
        events: &mpsc::Receiver<SessionEvent>,
        timeout: Duration,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.requests.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match events.recv_timeout(remaining) {
                Ok(event) => self.handle_event(event),
                Err(mpsc::RecvTimeoutError::Timeout) => return false,
                Err(mpsc::RecvTimeoutError::Disconnected) => return false,
            }
        }
        self.pump(events);
        true
    }

    pub(crate) fn mark_dirty(&mut self, dir: NodeId) {
        if !self.dirty.contains(&dir) {
            self.dirty.push(dir);
        }
    }

    /// Mark `id` (when a directory) and every ancestor directory dirty.
    pub(crate) fn mark_chain_dirty(&mut self, id: NodeId) {
        let mut current = match self.node(id) {
            Some(node) if node.is_dir() => Some(id),
            Some(node) => node.parent,
            None => None,
        };
        while let Some(cur) = current {
            if cur == self.root {
                break;
            }
            self.mark_dirty(cur);
            current = self.node(cur).and_then(|n| n.parent);
        }
    }

    pub(crate) fn changed(&mut self, id: NodeId) {
        self.observer.node_changed(id);
    }
}

/// Canonical form of a path when it exists, the path itself otherwise
pub(crate) fn canonical(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
