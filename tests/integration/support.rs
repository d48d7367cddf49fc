//! Shared fixtures for integration tests

use parking_lot::Mutex;
use sharetree::{ContentId, ScriptedSession, ShareTree};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Serializes tests that touch process environment variables.
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Run `f` with the given variables set, restoring previous values afterwards.
pub fn with_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
    let _guard = ENV_LOCK.lock();
    let saved: Vec<_> = vars
        .iter()
        .map(|(key, _)| (key.to_string(), std::env::var_os(key)))
        .collect();
    for (key, value) in vars {
        std::env::set_var(key, value);
    }
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    for (key, value) in saved {
        match value {
            Some(v) => std::env::set_var(&key, v),
            None => std::env::remove_var(&key),
        }
    }
    match result {
        Ok(r) => r,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Run `f` with XDG config and data homes inside `temp`.
pub fn with_xdg_env<R>(temp: &TempDir, f: impl FnOnce() -> R) -> R {
    with_xdg_env_vars(temp, &[], f)
}

/// [`with_xdg_env`] plus extra variables, under one lock.
pub fn with_xdg_env_vars<R>(temp: &TempDir, extra: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
    let config_home = temp.path().join("xdg-config");
    let data_home = temp.path().join("xdg-data");
    fs::create_dir_all(&config_home).unwrap();
    fs::create_dir_all(&data_home).unwrap();
    let mut vars = vec![
        ("XDG_CONFIG_HOME", config_home.to_str().unwrap()),
        ("XDG_DATA_HOME", data_home.to_str().unwrap()),
    ];
    vars.extend_from_slice(extra);
    with_env(&vars, f)
}

/// Identity derived from a label, distinct per label
pub fn identity(label: &str) -> ContentId {
    ContentId::from(blake3::hash(label.as_bytes()))
}

/// `music/{a.mp3, b.mp3, live/c.mp3}` under a fresh temp dir, with a tree
/// rooted at `music` driven by a scripted session.
pub struct MusicFixture {
    pub temp: TempDir,
    pub music: PathBuf,
    pub collections: PathBuf,
    pub session: Arc<ScriptedSession>,
    pub tree: ShareTree,
}

impl MusicFixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let music = temp.path().join("music");
        fs::create_dir_all(music.join("live")).unwrap();
        fs::write(music.join("a.mp3"), b"track a").unwrap();
        fs::write(music.join("b.mp3"), b"track b").unwrap();
        fs::write(music.join("live").join("c.mp3"), b"track c").unwrap();
        let music = dunce::canonicalize(&music).unwrap();
        let collections = temp.path().join("collections");
        let session = Arc::new(ScriptedSession::new());
        let tree = ShareTree::new(vec![music.clone()], collections.clone(), session.clone());
        Self {
            temp,
            music,
            collections,
            session,
            tree,
        }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        if rel.is_empty() {
            self.music.clone()
        } else {
            self.music.join(rel)
        }
    }

    /// Complete the latest resolution issued for `path`.
    pub fn resolve(&mut self, path: &Path, identity: ContentId, size: u64) {
        let token = self
            .session
            .token_for(path)
            .unwrap_or_else(|| panic!("no resolution requested for {}", path.display()));
        let event = self.session.complete(token, identity, size);
        self.tree.handle_event(event);
    }

    /// Resolve every outstanding request, each to an identity derived from its path.
    pub fn resolve_all(&mut self) {
        while let Some((token, path)) = self.session.outstanding().into_iter().next() {
            let event = self
                .session
                .complete(token, identity(&path.to_string_lossy()), 1);
            self.tree.handle_event(event);
        }
    }
}
