use sharetree::config::HashingConfig;
use sharetree::{ContentId, LocalTransferSession, ShareState, ShareTree};
use std::fs;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

const SETTLE: Duration = Duration::from_secs(20);

struct Live {
    _temp: tempfile::TempDir,
    root: std::path::PathBuf,
    session: Arc<LocalTransferSession>,
    events: mpsc::Receiver<sharetree::SessionEvent>,
    tree: ShareTree,
}

fn live() -> Live {
    let temp = tempfile::tempdir().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    let music = root.join("music");
    fs::create_dir_all(music.join("live")).unwrap();
    fs::write(music.join("a.mp3"), b"alpha").unwrap();
    fs::write(music.join("b.mp3"), b"bravo!").unwrap();
    fs::write(music.join("live").join("c.mp3"), vec![7u8; 200_000]).unwrap();

    let (tx, events) = mpsc::channel();
    let config = HashingConfig {
        workers: 3,
        buffer_size: 4096,
    };
    let session = Arc::new(LocalTransferSession::new(&config, tx).unwrap());
    let tree = ShareTree::new(vec![music], root.join("collections"), session.clone());
    Live {
        _temp: temp,
        root,
        session,
        events,
        tree,
    }
}

fn blake3_of(path: &Path) -> ContentId {
    ContentId::from(blake3::hash(&fs::read(path).unwrap()))
}

#[test]
fn recursive_share_settles_with_real_identities() {
    let mut lv = live();
    let music = lv.root.join("music");
    let dir = lv.tree.share_path(&music, true).unwrap();
    assert!(lv.tree.run_until_settled(&lv.events, SETTLE));

    for rel in ["a.mp3", "b.mp3", "live/c.mp3"] {
        let path = music.join(rel);
        let id = lv.tree.find_existing(&path).unwrap();
        let node = lv.tree.get(id).unwrap();
        assert_eq!(node.state(), ShareState::Active, "{}", rel);
        assert_eq!(node.transfer(), Some(blake3_of(&path)));
    }
    let c = lv.tree.find_existing(&music.join("live/c.mp3")).unwrap();
    assert_eq!(lv.tree.get(c).unwrap().size(), 200_000);

    let mut manifests: Vec<_> = lv
        .tree
        .collection_store()
        .list()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    manifests.sort();
    assert_eq!(manifests, vec!["music-2.emulecollection", "music-live-1.emulecollection"]);

    let collection_identity = lv.tree.get(dir).unwrap().transfer().unwrap();
    assert!(lv.session.has_transfer(&collection_identity));
    // three files plus two collections
    assert_eq!(lv.session.transfers().len(), 5);
}

#[test]
fn unshare_member_replaces_collection_on_disk() {
    let mut lv = live();
    let music = lv.root.join("music");
    lv.tree.share_path(&music, false).unwrap();
    assert!(lv.tree.run_until_settled(&lv.events, SETTLE));
    let old = lv.root.join("collections").join("music-2.emulecollection");
    assert!(old.exists());

    lv.tree.unshare_path(&music.join("b.mp3"), false).unwrap();
    assert!(lv.tree.run_until_settled(&lv.events, SETTLE));

    assert!(!old.exists());
    assert!(lv.root.join("collections").join("music-1.emulecollection").exists());
    assert!(music.join("b.mp3").exists());
}

#[test]
fn reshare_from_cache_survives_pending_events() {
    let mut lv = live();
    let a = lv.root.join("music").join("a.mp3");
    let identity = blake3_of(&a);
    let id = lv.tree.share_path(&a, false).unwrap();
    assert!(lv.tree.run_until_settled(&lv.events, SETTLE));

    lv.tree.unshare(id, false).unwrap();
    lv.tree.share(id, false).unwrap();
    lv.tree.pump(&lv.events);

    let node = lv.tree.get(id).unwrap();
    assert_eq!(node.state(), ShareState::Active);
    assert_eq!(node.transfer(), Some(identity));
    assert!(lv.session.has_transfer(&identity));

    lv.tree.unshare(id, false).unwrap();
    lv.tree.share(id, false).unwrap();
    lv.tree.pump(&lv.events);

    let node = lv.tree.get(id).unwrap();
    assert_eq!(node.state(), ShareState::Active);
    assert_eq!(node.last_error(), None);
    assert_eq!(lv.session.transfers().len(), 1);
}

#[test]
fn unshare_while_hashing_never_activates() {
    let mut lv = live();
    let c = lv.root.join("music").join("live").join("c.mp3");
    let id = lv.tree.share_path(&c, false).unwrap();
    lv.tree.unshare(id, false).unwrap();

    assert!(lv.tree.run_until_settled(&lv.events, SETTLE));

    let node = lv.tree.get(id).unwrap();
    assert_eq!(node.state(), ShareState::Inactive);
    assert_eq!(node.transfer(), None);
    assert!(lv.session.transfers().is_empty());
}

#[test]
fn externally_finished_and_dropped_transfers_update_nodes() {
    let mut lv = live();
    let a = lv.root.join("music").join("a.mp3");
    let identity = blake3_of(&a);

    lv.session.attach_finished(identity, &a);
    lv.tree.pump(&lv.events);
    let id = lv.tree.find_existing(&a).unwrap();
    assert_eq!(lv.tree.get(id).unwrap().state(), ShareState::Active);

    lv.session.drop_transfer(&identity);
    lv.tree.pump(&lv.events);
    assert_eq!(lv.tree.get(id).unwrap().state(), ShareState::Inactive);
    assert_eq!(lv.tree.node_for_transfer(&identity), None);
}

#[test]
fn missing_file_records_resolution_failure() {
    let mut lv = live();
    let a = lv.root.join("music").join("a.mp3");
    let id = lv.tree.node_for_path(&a).unwrap();
    fs::remove_file(&a).unwrap();
    lv.tree.share(id, false).unwrap();

    assert!(lv.tree.run_until_settled(&lv.events, SETTLE));

    let node = lv.tree.get(id).unwrap();
    assert_eq!(node.state(), ShareState::Inactive);
    assert!(matches!(
        node.last_error(),
        Some(sharetree::NodeError::ResolutionFailure(_))
    ));
}
