//! Collection Builder
//!
//! A shared directory whose shared files all have registered transfers gets
//! one manifest listing them. The manifest is written to the collection
//! directory, resolved like any other file and registered as the directory's
//! own transfer. Any membership change drops the collection; the directory is
//! marked dirty and rebuilt once its members settle again.

pub mod manifest;

pub use manifest::{Manifest, ManifestEntry, COLLECTION_EXTENSION};

use crate::error::{CollectionError, ResolveError};
use crate::session::Resolution;
use crate::tree::{canonical, CollectionRef, Node, ShareState, ShareTree};
use crate::types::{NodeId, RequestToken};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Base name used when no shared directory contributes to the name
const DEFAULT_BASE: &str = "collection";

/// The directory manifests are written to
#[derive(Debug, Clone)]
pub struct CollectionStore {
    dir: PathBuf,
}

impl CollectionStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First free `<base>[_<n>]-<count>` manifest path
    pub fn allocate_path(&self, base: &str, count: usize) -> PathBuf {
        let mut suffix = 0usize;
        loop {
            let name = if suffix == 0 {
                format!("{}-{}.{}", base, count, COLLECTION_EXTENSION)
            } else {
                format!("{}_{}-{}.{}", base, suffix, count, COLLECTION_EXTENSION)
            };
            let path = self.dir.join(name);
            if !path.exists() {
                return path;
            }
            suffix += 1;
        }
    }

    /// Write `manifest` under a fresh name derived from `base`.
    pub fn write_manifest(&self, base: &str, manifest: &Manifest) -> Result<PathBuf, CollectionError> {
        fs::create_dir_all(&self.dir).map_err(|source| CollectionError::ManifestWrite {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.allocate_path(base, manifest.len());
        manifest.write(&path)?;
        Ok(canonical(&path))
    }

    /// Manifests currently in the collection directory, sorted by name
    pub fn list(&self) -> Vec<PathBuf> {
        if !self.dir.is_dir() {
            return Vec::new();
        }
        WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().is_some_and(|ext| ext == COLLECTION_EXTENSION))
            .collect()
    }
}

impl ShareTree {
    /// Re-evaluate every directory marked dirty since the last pass.
    pub(crate) fn rebuild_dirty_collections(&mut self) {
        let dirty = std::mem::take(&mut self.dirty);
        for dir in dirty {
            if let Err(e) = self.build_collection(dir) {
                warn!(node = %dir, "Collection not written: {}", e);
            }
        }
    }

    /// Build the collection of an active directory once all of its shared
    /// files are registered. Does nothing while any member is still pending.
    fn build_collection(&mut self, id: NodeId) -> Result<(), CollectionError> {
        let Some(node) = self.node(id) else {
            return Ok(());
        };
        let Some(dir) = node.as_dir() else {
            return Ok(());
        };
        if !node.is_active() || node.transfer.is_some() || dir.collection.is_some() {
            return Ok(());
        }

        let mut entries = Vec::new();
        for file in dir.file_order.iter().filter_map(|&f| self.node(f)) {
            if !file.state.is_requested() {
                continue;
            }
            match (file.state, file.transfer) {
                (ShareState::Active, Some(identity)) => entries.push(ManifestEntry {
                    name: file.name.clone(),
                    size: file.size(),
                    identity,
                }),
                _ => {
                    debug!(node = %id, pending = %file.name, "Collection deferred");
                    return Ok(());
                }
            }
        }
        if entries.is_empty() {
            return Ok(());
        }

        let manifest = Manifest::new(entries);
        let base = self.collection_name(id);
        let path = self.collections.write_manifest(&base, &manifest)?;
        let token = self.session.resolve_identity_async(&path);
        self.requests.insert(token, id);
        if let Some(dir) = self.node_mut(id).and_then(Node::as_dir_mut) {
            dir.collection = Some(CollectionRef {
                path: path.clone(),
                members: manifest.len(),
                request: Some(token),
            });
        }
        info!(node = %id, path = ?path, members = manifest.len(), "Collection written");

        self.materialize_manifest(&path);
        self.changed(id);
        Ok(())
    }

    /// Base name of a directory's manifest: the names of every active
    /// directory from the top of its root down to itself, joined by `-`.
    pub fn collection_name(&self, id: NodeId) -> String {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            if cur == self.root {
                break;
            }
            let Some(node) = self.node(cur) else {
                break;
            };
            if node.is_dir() && node.is_active() {
                let name = sanitize(last_component(&node.name));
                if !name.is_empty() {
                    chain.push(name);
                }
            }
            current = node.parent;
        }
        if chain.is_empty() {
            return DEFAULT_BASE.to_string();
        }
        chain.reverse();
        chain.join("-")
    }

    /// Forget a directory's collection: delete its transfer and manifest,
    /// cancel an in-flight manifest resolution, and mark it for rebuild.
    /// Returns whether there was anything to drop.
    pub(crate) fn drop_collection(&mut self, id: NodeId) -> bool {
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        if !node.is_dir() {
            return false;
        }
        let transfer = node.transfer.take();
        let collection = node.as_dir_mut().and_then(|dir| dir.collection.take());
        self.mark_dirty(id);
        if transfer.is_none() && collection.is_none() {
            return false;
        }

        if let Some(identity) = transfer {
            self.transfers.remove(&identity);
            self.session.delete_transfer(&identity, false);
        }
        if let Some(collection) = collection {
            if let Some(token) = collection.request {
                self.session.cancel_resolution(token);
                self.requests.remove(&token);
            }
            self.discard_manifest(&collection.path);
        }
        debug!(node = %id, "Collection dropped");
        self.changed(id);
        true
    }

    /// Completion of a manifest resolution: register it as the directory's
    /// transfer, or abandon this collection on failure.
    pub(crate) fn on_collection_resolved(
        &mut self,
        id: NodeId,
        token: RequestToken,
        result: Result<Resolution, ResolveError>,
    ) {
        let path = {
            let Some(collection) = self
                .node_mut(id)
                .and_then(Node::as_dir_mut)
                .and_then(|dir| dir.collection.as_mut())
            else {
                debug!(%token, node = %id, "Stale collection resolution ignored");
                return;
            };
            if collection.request != Some(token) {
                debug!(%token, node = %id, "Stale collection resolution ignored");
                return;
            }
            collection.request = None;
            collection.path.clone()
        };

        let registered = result
            .map_err(|e| e.to_string())
            .and_then(|res| {
                self.session
                    .create_transfer(&res.identity, &path)
                    .map(|()| res.identity)
                    .map_err(|e| e.to_string())
            });

        match registered {
            Ok(identity) => {
                if let Some(node) = self.node_mut(id) {
                    node.transfer = Some(identity);
                }
                self.transfers.insert(identity, id);
                if let Some(file) = self
                    .find_existing(&path)
                    .and_then(|m| self.node_mut(m))
                    .and_then(Node::as_file_mut)
                {
                    file.resolved = Some(identity);
                }
                info!(node = %id, %identity, "Collection shared");
            }
            Err(reason) => {
                warn!(node = %id, path = ?path, "Collection abandoned: {}", reason);
                if let Some(dir) = self.node_mut(id).and_then(Node::as_dir_mut) {
                    dir.collection = None;
                }
                self.discard_manifest(&path);
            }
        }
        self.changed(id);
    }

    /// Show a freshly written manifest in the tree when its directory is
    /// already populated.
    fn materialize_manifest(&mut self, path: &Path) {
        let (Some(parent_path), Some(name)) = (path.parent(), path.file_name()) else {
            return;
        };
        let Some(parent) = self.find_existing(parent_path) else {
            return;
        };
        let name = name.to_string_lossy().into_owned();
        let ready = self
            .node(parent)
            .and_then(Node::as_dir)
            .map(|dir| dir.is_populated() && dir.child(&name).is_none())
            .unwrap_or(false);
        if !ready {
            return;
        }
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if let Err(e) = self.insert_child(parent, Node::file(name, parent, size)) {
            warn!(path = ?path, "Failed to insert manifest node: {}", e);
        }
    }

    /// Delete a manifest from disk and from the tree.
    fn discard_manifest(&mut self, path: &Path) {
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                warn!(path = ?path, "Failed to remove manifest: {}", e);
            }
        }
        if let Some(node) = self.find_existing(path) {
            if let Err(e) = self.detach_subtree(node) {
                debug!(path = ?path, "Manifest node already gone: {}", e);
            }
        }
    }
}

fn last_component(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name)
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches(|c: char| c == '.' || c == ' ')
        .to_string()
}
