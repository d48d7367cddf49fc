use crate::integration::support::{identity, MusicFixture};
use proptest::prelude::*;
use sharetree::session::SessionCall;
use sharetree::{ChangeEvent, RecordingObserver, ShareState, ShareTree};

#[test]
fn share_directory_notifies_inserts_then_changes() {
    let fx = MusicFixture::new();
    let events = RecordingObserver::new();
    let mut tree = ShareTree::new(
        vec![fx.music.clone()],
        fx.collections.clone(),
        fx.session.clone(),
    )
    .with_observer(Box::new(events.clone()));
    let music = tree.node_for_path(&fx.music).unwrap();
    events.take();

    tree.share(music, false).unwrap();

    let log = events.events();
    let inserts = log
        .iter()
        .filter(|e| matches!(e, ChangeEvent::BeginInsert { parent, .. } if *parent == music))
        .count();
    assert_eq!(inserts, 3);
    assert_eq!(
        log.iter().filter(|e| matches!(e, ChangeEvent::EndInsert)).count(),
        3
    );
    // every insert completes before any file changes state
    let last_insert = log
        .iter()
        .rposition(|e| matches!(e, ChangeEvent::EndInsert))
        .unwrap();
    let first_change = log
        .iter()
        .position(|e| matches!(e, ChangeEvent::NodeChanged(_)))
        .unwrap();
    assert!(last_insert < first_change);
    assert!(log.contains(&ChangeEvent::NodeChanged(music)));
}

#[test]
fn partially_shared_directory_does_not_duplicate_transfers() {
    let mut fx = MusicFixture::new();
    let a = fx.tree.share_path(&fx.path("a.mp3"), false).unwrap();
    fx.resolve(&fx.path("a.mp3"), identity("a"), 7);
    assert_eq!(fx.tree.get(a).unwrap().state(), ShareState::Active);

    fx.tree.share_path(&fx.path(""), false).unwrap();

    assert_eq!(fx.session.create_count(), 1);
    assert_eq!(fx.session.resolve_count(), 2);
    assert_eq!(fx.tree.get(a).unwrap().transfer(), Some(identity("a")));
}

#[test]
fn non_recursive_share_drops_stale_child_collections() {
    let mut fx = MusicFixture::new();
    let live = fx.tree.share_path(&fx.path("live"), false).unwrap();
    fx.resolve_all();
    let before = fx
        .tree
        .get(live)
        .unwrap()
        .as_dir()
        .unwrap()
        .collection()
        .unwrap()
        .path
        .clone();
    assert!(before.ends_with("live-1.emulecollection"));

    fx.tree.share_path(&fx.path(""), false).unwrap();

    // rebuilt under the new active chain
    let after = fx
        .tree
        .get(live)
        .unwrap()
        .as_dir()
        .unwrap()
        .collection()
        .unwrap()
        .path
        .clone();
    assert!(after.ends_with("music-live-1.emulecollection"));
    assert!(!before.exists());
    assert_eq!(fx.tree.get(live).unwrap().state(), ShareState::Active);
}

#[test]
fn recursive_unshare_clears_every_transfer() {
    let mut fx = MusicFixture::new();
    let music = fx.tree.share_path(&fx.path(""), true).unwrap();
    fx.resolve_all();
    assert!(fx.tree.all_active_children(music));
    assert!(fx.session.transfer_count() >= 5);

    fx.tree.unshare(music, true).unwrap();

    assert!(!fx.tree.contains_active_children(music));
    assert_eq!(fx.session.transfer_count(), 0);
    assert!(fx
        .session
        .calls()
        .iter()
        .any(|c| matches!(c, SessionCall::Delete { keep_local_data: true, .. })));
    assert!(fx.music.join("a.mp3").exists());
}

#[test]
fn excluded_files_track_individual_unshares() {
    let mut fx = MusicFixture::new();
    let music = fx.tree.share_path(&fx.path(""), false).unwrap();
    fx.resolve_all();
    fx.tree.unshare_path(&fx.path("b.mp3"), false).unwrap();

    assert_eq!(fx.tree.excluded_files(music), vec!["b.mp3".to_string()]);
    assert!(fx.tree.contains_active_children(music));
    assert!(!fx.tree.all_active_children(music));
}

#[derive(Debug, Clone)]
enum Op {
    Share(usize, bool),
    Unshare(usize, bool),
    Complete(usize),
}

const TARGETS: [&str; 5] = ["", "a.mp3", "b.mp3", "live", "live/c.mp3"];

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..TARGETS.len(), any::<bool>()).prop_map(|(t, r)| Op::Share(t, r)),
        (0..TARGETS.len(), any::<bool>()).prop_map(|(t, r)| Op::Unshare(t, r)),
        (0..8usize).prop_map(Op::Complete),
    ]
}

fn check_consistency(tree: &ShareTree, fx_paths: &[std::path::PathBuf]) {
    for path in fx_paths {
        let Some(id) = tree.find_existing(path) else {
            continue;
        };
        let node = tree.get(id).unwrap();
        if node.is_dir() {
            if node.transfer().is_some() {
                assert!(node.is_active(), "collection on inactive dir {}", path.display());
            }
        } else {
            assert_eq!(
                node.state() == ShareState::Active,
                node.transfer().is_some(),
                "active files and registered transfers disagree for {}",
                path.display()
            );
            if node.state() == ShareState::Pending {
                assert!(node.pending_request().is_some());
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn unshare_is_idempotent_after_any_history(ops in prop::collection::vec(op_strategy(), 0..20)) {
        let mut fx = MusicFixture::new();
        let paths: Vec<_> = TARGETS.iter().map(|t| fx.path(t)).collect();

        for op in ops {
            match op {
                Op::Share(t, recursive) => {
                    fx.tree.share_path(&paths[t], recursive).unwrap();
                }
                Op::Unshare(t, recursive) => {
                    fx.tree.unshare_path(&paths[t], recursive).unwrap();
                }
                Op::Complete(i) => {
                    let outstanding = fx.session.outstanding();
                    if !outstanding.is_empty() {
                        let (token, path) = outstanding[i % outstanding.len()].clone();
                        let event = fx.session.complete(token, identity(&path.to_string_lossy()), 1);
                        fx.tree.handle_event(event);
                    }
                }
            }
            check_consistency(&fx.tree, &paths);
        }

        let music = fx.tree.node_for_path(&paths[0]).unwrap();
        fx.tree.unshare(music, true).unwrap();
        let calls = fx.session.calls().len();
        fx.tree.unshare(music, true).unwrap();

        prop_assert_eq!(fx.session.calls().len(), calls);
        prop_assert!(!fx.tree.contains_active_children(music));
        prop_assert_eq!(fx.session.transfer_count(), 0);
    }
}
