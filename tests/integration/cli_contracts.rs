use crate::integration::support::{with_xdg_env, with_xdg_env_vars};
use sharetree::tooling::cli::{CliContext, Commands};
use std::fs;
use tempfile::TempDir;

fn write_global_config(temp: &TempDir, body: &str) {
    let dir = temp.path().join("xdg-config").join("sharetree");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.toml"), body).unwrap();
}

#[test]
fn global_config_is_loaded_and_roots_overridden() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("media");
    fs::create_dir_all(&root).unwrap();
    write_global_config(&temp, "roots = [\"/nowhere\"]\n[hashing]\nworkers = 3\n");

    with_xdg_env(&temp, || {
        let ctx = CliContext::new(None, vec![root.clone()], None).unwrap();
        assert_eq!(ctx.config().hashing.workers, 3);
        assert_eq!(ctx.config().roots, vec![root.clone()]);
        assert_eq!(
            ctx.config().resolve_collection_dir().unwrap(),
            temp.path().join("xdg-data").join("sharetree").join("collections")
        );
    });
}

#[test]
fn environment_overrides_files() {
    let temp = TempDir::new().unwrap();
    write_global_config(&temp, "[hashing]\nworkers = 3\n");
    let explicit = temp.path().join("explicit.toml");
    fs::write(&explicit, "[hashing]\nworkers = 4\nbuffer_size = 1024\n").unwrap();

    with_xdg_env(&temp, || {
        let ctx = CliContext::new(Some(explicit.clone()), vec![], None).unwrap();
        assert_eq!(ctx.config().hashing.workers, 4);
    });

    with_xdg_env_vars(&temp, &[("SHARETREE__HASHING__WORKERS", "5")], || {
        let ctx = CliContext::new(Some(explicit.clone()), vec![], None).unwrap();
        assert_eq!(ctx.config().hashing.workers, 5);
        assert_eq!(ctx.config().hashing.buffer_size, 1024);
    });
}

#[test]
fn share_then_collections_contract() {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap().join("media");
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("docs").join("one.txt"), b"1").unwrap();
    fs::write(root.join("docs").join("two.txt"), b"22").unwrap();
    let collections = temp.path().join("out");

    with_xdg_env(&temp, || {
        let ctx = CliContext::new(None, vec![root.clone()], Some(collections.clone())).unwrap();
        let table = ctx
            .execute(&Commands::Share {
                paths: vec![root.join("docs")],
                recursive: false,
                timeout: 30,
                format: "text".to_string(),
            })
            .unwrap();
        assert!(table.contains("docs-2.emulecollection"));
        assert!(table.contains("active"));

        let listing = ctx
            .execute(&Commands::Collections {
                format: "text".to_string(),
            })
            .unwrap();
        assert!(listing.contains("docs-2.emulecollection"));
    });
}
