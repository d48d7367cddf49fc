//! Change Notifications
//!
//! Ordered structural-change events consumed by presentation layers. Every
//! insert or remove is bracketed: the `begin_*` call happens before the
//! child collections change and the `end_*` call after, so observers can keep
//! row positions consistent with the tree at all times.

use crate::types::NodeId;
use parking_lot::Mutex;
use std::sync::Arc;

/// Observer of structural and in-place changes to the tree
pub trait ChangeObserver: Send {
    fn begin_insert(&mut self, parent: NodeId, position: usize);
    fn end_insert(&mut self);
    fn begin_remove(&mut self, parent: NodeId, position: usize);
    fn end_remove(&mut self);
    /// Fired after any in-place state mutation (share state, error, identity).
    fn node_changed(&mut self, node: NodeId);
}

/// Observer that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ChangeObserver for NullObserver {
    fn begin_insert(&mut self, _parent: NodeId, _position: usize) {}
    fn end_insert(&mut self) {}
    fn begin_remove(&mut self, _parent: NodeId, _position: usize) {}
    fn end_remove(&mut self) {}
    fn node_changed(&mut self, _node: NodeId) {}
}

/// A single recorded notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    BeginInsert { parent: NodeId, position: usize },
    EndInsert,
    BeginRemove { parent: NodeId, position: usize },
    EndRemove,
    NodeChanged(NodeId),
}

/// Observer that appends every notification to a shared log.
///
/// Clones share the same log, so a caller can keep one handle and hand the
/// other to the tree.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<ChangeEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<ChangeEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of `NodeChanged` events recorded for `node`
    pub fn changes_for(&self, node: NodeId) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, ChangeEvent::NodeChanged(n) if *n == node))
            .count()
    }

    fn push(&self, event: ChangeEvent) {
        self.events.lock().push(event);
    }
}

impl ChangeObserver for RecordingObserver {
    fn begin_insert(&mut self, parent: NodeId, position: usize) {
        self.push(ChangeEvent::BeginInsert { parent, position });
    }

    fn end_insert(&mut self) {
        self.push(ChangeEvent::EndInsert);
    }

    fn begin_remove(&mut self, parent: NodeId, position: usize) {
        self.push(ChangeEvent::BeginRemove { parent, position });
    }

    fn end_remove(&mut self) {
        self.push(ChangeEvent::EndRemove);
    }

    fn node_changed(&mut self, node: NodeId) {
        self.push(ChangeEvent::NodeChanged(node));
    }
}
