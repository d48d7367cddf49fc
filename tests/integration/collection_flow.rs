use crate::integration::support::{identity, MusicFixture};
use sharetree::collection::Manifest;
use sharetree::session::{SessionCall, SessionEvent};
use sharetree::{ChangeEvent, NodeId, RecordingObserver, ShareTree};
use std::fs;
use std::path::PathBuf;

fn collection_path(tree: &ShareTree, dir: NodeId) -> Option<PathBuf> {
    tree.get(dir)
        .unwrap()
        .as_dir()
        .unwrap()
        .collection()
        .map(|c| c.path.clone())
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

#[test]
fn two_member_collection_in_either_resolution_order() {
    for reversed in [false, true] {
        let mut fx = MusicFixture::new();
        let music = fx.tree.share_path(&fx.path(""), false).unwrap();
        let mut order = vec![("a.mp3", identity("H1")), ("b.mp3", identity("H2"))];
        if reversed {
            order.reverse();
        }
        for (name, id) in order {
            fx.resolve(&fx.path(name), id, 7);
        }

        let path = collection_path(&fx.tree, music).unwrap();
        assert_eq!(file_name(&path), "music-2.emulecollection");
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                format!("ed2k://|file|a.mp3|7|{}|/", identity("H1").to_hex()),
                format!("ed2k://|file|b.mp3|7|{}|/", identity("H2").to_hex()),
            ]
        );
    }
}

#[test]
fn unsharing_a_member_regenerates_one_entry_collection() {
    let mut fx = MusicFixture::new();
    let music = fx.tree.share_path(&fx.path(""), false).unwrap();
    fx.resolve(&fx.path("a.mp3"), identity("H1"), 7);
    fx.resolve(&fx.path("b.mp3"), identity("H2"), 7);
    let first = collection_path(&fx.tree, music).unwrap();
    fx.resolve(&first, identity("M2"), 140);
    assert_eq!(fx.tree.node_for_transfer(&identity("M2")), Some(music));

    fx.tree.unshare_path(&fx.path("a.mp3"), false).unwrap();

    assert!(fx.session.calls().contains(&SessionCall::Delete {
        identity: identity("M2"),
        keep_local_data: false,
    }));
    let second = collection_path(&fx.tree, music).unwrap();
    assert_eq!(file_name(&second), "music-1.emulecollection");
    let manifest = Manifest::read(&second).unwrap();
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest.entries[0].name, "b.mp3");
    assert_eq!(manifest.entries[0].identity, identity("H2"));
}

#[test]
fn pending_member_defers_until_resolved_and_builds_once() {
    let mut fx = MusicFixture::new();
    let music = fx.tree.share_path(&fx.path(""), false).unwrap();
    fx.resolve(&fx.path("a.mp3"), identity("H1"), 7);
    assert!(collection_path(&fx.tree, music).is_none());

    fx.resolve(&fx.path("b.mp3"), identity("H2"), 7);
    fx.resolve(&fx.path("b.mp3"), identity("H2"), 7);

    let manifests: Vec<_> = fs::read_dir(&fx.collections).unwrap().collect();
    assert_eq!(manifests.len(), 1);
    let manifest_resolves = fx
        .session
        .calls()
        .iter()
        .filter(|c| matches!(c, SessionCall::Resolve { path, .. } if path.starts_with(fx.collections.canonicalize().unwrap())))
        .count();
    assert_eq!(manifest_resolves, 1);
}

#[test]
fn failed_member_resolution_leaves_the_rest_collected() {
    let mut fx = MusicFixture::new();
    let music = fx.tree.share_path(&fx.path(""), false).unwrap();
    let a_token = fx.session.token_for(&fx.path("a.mp3")).unwrap();
    let event = fx.session.fail(
        a_token,
        sharetree::ResolveError::Io("permission denied".to_string()),
    );
    fx.tree.handle_event(event);
    fx.resolve(&fx.path("b.mp3"), identity("H2"), 7);

    let path = collection_path(&fx.tree, music).unwrap();
    assert_eq!(file_name(&path), "music-1.emulecollection");
    assert_eq!(fx.tree.excluded_files(music), vec!["a.mp3".to_string()]);
}

#[test]
fn session_dropping_collection_transfer_clears_it_without_rebuild() {
    let mut fx = MusicFixture::new();
    let music = fx.tree.share_path(&fx.path(""), false).unwrap();
    fx.resolve_all();
    let identity = fx.tree.get(music).unwrap().transfer().unwrap();
    let resolves = fx.session.resolve_count();

    fx.tree
        .handle_event(SessionEvent::TransferDeleted { identity });

    assert_eq!(fx.tree.get(music).unwrap().transfer(), None);
    assert!(collection_path(&fx.tree, music).is_none());
    assert_eq!(fx.session.resolve_count(), resolves);
}

#[test]
fn manifest_appears_in_populated_collection_directory() {
    let temp = tempfile::tempdir().unwrap();
    let base = dunce::canonicalize(temp.path()).unwrap();
    fs::create_dir_all(base.join("music")).unwrap();
    fs::create_dir_all(base.join("shared-collections")).unwrap();
    fs::write(base.join("music").join("a.mp3"), b"a").unwrap();

    let session = std::sync::Arc::new(sharetree::ScriptedSession::new());
    let events = RecordingObserver::new();
    let mut tree = ShareTree::new(
        vec![base.clone()],
        base.join("shared-collections"),
        session.clone(),
    )
    .with_observer(Box::new(events.clone()));
    let store = tree.node_for_path(&base.join("shared-collections")).unwrap();
    tree.populate(store).unwrap();
    tree.share_path(&base.join("music"), false).unwrap();
    events.take();

    let token = session.token_for(&base.join("music").join("a.mp3")).unwrap();
    tree.handle_event(session.complete(token, identity("A"), 1));

    let log = events.take();
    let insert = log
        .iter()
        .position(|e| *e == ChangeEvent::BeginInsert { parent: store, position: 0 })
        .expect("manifest insert");
    assert_eq!(log[insert + 1], ChangeEvent::EndInsert);
    let manifest = tree.children(store)[0];
    assert_eq!(tree.get(manifest).unwrap().name(), "music-1.emulecollection");

    // resolution of the manifest fills in the materialized node's identity
    let path = tree.path_of(manifest).unwrap();
    let token = session.token_for(&path).unwrap();
    tree.handle_event(session.complete(token, identity("M"), 1));
    assert_eq!(tree.get(manifest).unwrap().content_identity(), Some(identity("M")));
}
