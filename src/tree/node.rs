//! Filesystem node types

use crate::error::NodeError;
use crate::types::{ContentId, NodeId, RequestToken};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Share state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareState {
    /// Not shared
    Inactive,
    /// Share requested, waiting for content identity resolution
    Pending,
    /// Shared: files are backed by a transfer, directories are marked by user intent
    Active,
}

impl ShareState {
    /// True for Pending and Active: the user asked for this node to be shared.
    pub fn is_requested(&self) -> bool {
        !matches!(self, ShareState::Inactive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShareState::Inactive => "inactive",
            ShareState::Pending => "pending",
            ShareState::Active => "active",
        }
    }
}

/// File-specific node data
#[derive(Debug, Clone, Default)]
pub struct FileNode {
    /// Size on disk in bytes, refreshed by resolution
    pub(crate) size: u64,
    /// Cached result of the last successful resolution
    pub(crate) resolved: Option<ContentId>,
    /// Resolution currently in flight for this file
    pub(crate) request: Option<RequestToken>,
}

impl FileNode {
    pub(crate) fn new(size: u64) -> Self {
        Self {
            size,
            resolved: None,
            request: None,
        }
    }
}

/// Collection state held by a directory
#[derive(Debug, Clone)]
pub struct CollectionRef {
    /// Manifest written to the collection directory
    pub path: PathBuf,
    /// Number of entries in the manifest
    pub members: usize,
    /// Resolution of the manifest itself, while in flight
    pub(crate) request: Option<RequestToken>,
}

/// Directory-specific node data
#[derive(Debug, Clone, Default)]
pub struct DirectoryNode {
    pub(crate) populated: bool,
    pub(crate) files: HashMap<String, NodeId>,
    pub(crate) dirs: HashMap<String, NodeId>,
    pub(crate) file_order: Vec<NodeId>,
    pub(crate) dir_order: Vec<NodeId>,
    pub(crate) collection: Option<CollectionRef>,
}

impl DirectoryNode {
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// Immediate file children in insertion order
    pub fn files(&self) -> &[NodeId] {
        &self.file_order
    }

    /// Immediate directory children in insertion order
    pub fn dirs(&self) -> &[NodeId] {
        &self.dir_order
    }

    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.dirs.get(name).or_else(|| self.files.get(name)).copied()
    }

    pub fn collection(&self) -> Option<&CollectionRef> {
        self.collection.as_ref()
    }

    pub fn child_count(&self) -> usize {
        self.dir_order.len() + self.file_order.len()
    }

    /// Row position of a child: directories first, then files, each in
    /// insertion order.
    pub fn position_of(&self, child: NodeId) -> Option<usize> {
        if let Some(pos) = self.dir_order.iter().position(|&id| id == child) {
            return Some(pos);
        }
        self.file_order
            .iter()
            .position(|&id| id == child)
            .map(|pos| self.dir_order.len() + pos)
    }
}

/// Node variant
#[derive(Debug, Clone)]
pub enum NodeKind {
    File(FileNode),
    Directory(DirectoryNode),
}

/// A node of the share tree: one filesystem path
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) state: ShareState,
    /// Identity of the transfer this node registered: the file's own
    /// transfer, or a directory's collection transfer.
    pub(crate) transfer: Option<ContentId>,
    pub(crate) last_error: Option<NodeError>,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn file(name: String, parent: NodeId, size: u64) -> Self {
        Self {
            name,
            parent: Some(parent),
            state: ShareState::Inactive,
            transfer: None,
            last_error: None,
            kind: NodeKind::File(FileNode::new(size)),
        }
    }

    pub(crate) fn directory(name: String, parent: Option<NodeId>) -> Self {
        Self {
            name,
            parent,
            state: ShareState::Inactive,
            transfer: None,
            last_error: None,
            kind: NodeKind::Directory(DirectoryNode::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn state(&self) -> ShareState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ShareState::Active
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn last_error(&self) -> Option<&NodeError> {
        self.last_error.as_ref()
    }

    /// Registered transfer, if any
    pub fn transfer(&self) -> Option<ContentId> {
        self.transfer
    }

    pub fn has_transfer(&self) -> bool {
        self.transfer.is_some()
    }

    /// Resolved content identity: the cached resolution for a file, the
    /// collection transfer for a directory.
    pub fn content_identity(&self) -> Option<ContentId> {
        match &self.kind {
            NodeKind::File(file) => file.resolved,
            NodeKind::Directory(_) => self.transfer,
        }
    }

    /// Size in bytes (zero for directories)
    pub fn size(&self) -> u64 {
        match &self.kind {
            NodeKind::File(file) => file.size,
            NodeKind::Directory(_) => 0,
        }
    }

    /// Resolution in flight for this node, if any
    pub fn pending_request(&self) -> Option<RequestToken> {
        match &self.kind {
            NodeKind::File(file) => file.request,
            NodeKind::Directory(dir) => dir.collection.as_ref().and_then(|c| c.request),
        }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match &self.kind {
            NodeKind::File(file) => Some(file),
            NodeKind::Directory(_) => None,
        }
    }

    pub fn as_dir(&self) -> Option<&DirectoryNode> {
        match &self.kind {
            NodeKind::Directory(dir) => Some(dir),
            NodeKind::File(_) => None,
        }
    }

    pub(crate) fn as_file_mut(&mut self) -> Option<&mut FileNode> {
        match &mut self.kind {
            NodeKind::File(file) => Some(file),
            NodeKind::Directory(_) => None,
        }
    }

    pub(crate) fn as_dir_mut(&mut self) -> Option<&mut DirectoryNode> {
        match &mut self.kind {
            NodeKind::Directory(dir) => Some(dir),
            NodeKind::File(_) => None,
        }
    }
}
