//! Path store behaviour shared by every backend

use pipeline_launch::store::{
    AnonymousCredentials, Credentials, CredentialProvider, EntryKind, FileCredentialProvider,
    LocalPathStore, MemoryObjectClient, ObjectPathStore, OpenMode, PathStore, StoreError,
    StoreRegistry,
};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn gcs_store() -> ObjectPathStore<MemoryObjectClient> {
    ObjectPathStore::new("gs://", AnonymousCredentials, |_| Ok(MemoryObjectClient::new()))
}

fn write(store: &dyn PathStore, path: &str, content: &str) {
    let mut file = store.open(path, OpenMode::Write).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.close().unwrap();
}

fn read(store: &dyn PathStore, path: &str) -> String {
    let mut content = String::new();
    store
        .open(path, OpenMode::Read)
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    content
}

/// Runs `check` against the object store under `gs://bucket` and the local
/// store under a temporary directory
fn for_each_backend(check: impl Fn(&dyn PathStore, &str)) {
    let object = gcs_store();
    check(&object, "gs://bucket");

    let dir = tempfile::tempdir().unwrap();
    let root = format!("file://{}", dir.path().display());
    check(&LocalPathStore::new(), &root);
}

#[test]
fn test_glob_double_star() {
    let store = gcs_store();
    for path in [
        "gs://bucket/data/x/y.csv",
        "gs://bucket/data/x/z/y.csv",
        "gs://bucket/data/y.csv",
        "gs://bucket/data/x/y.txt",
        "gs://bucket/other/y.csv",
    ] {
        write(&store, path, "");
    }

    let matches = store.glob("gs://bucket/data/**/*.csv").unwrap();
    assert_eq!(
        matches,
        [
            "gs://bucket/data/x/y.csv",
            "gs://bucket/data/x/z/y.csv",
            "gs://bucket/data/y.csv",
        ]
    );
}

#[test]
fn test_glob_matches_directories_too() {
    for_each_backend(|store, root| {
        store.makedirs(&format!("{}/runs/run_1", root)).unwrap();
        store.makedirs(&format!("{}/runs/run_2", root)).unwrap();
        write(store, &format!("{}/runs/notes.txt", root), "");

        let matches = store.glob(&format!("{}/runs/run_?", root)).unwrap();
        assert_eq!(
            matches,
            [format!("{}/runs/run_1", root), format!("{}/runs/run_2", root)]
        );
    });
}

#[test]
fn test_makedirs_is_idempotent() {
    for_each_backend(|store, root| {
        let path = format!("{}/a/b/c", root);
        store.makedirs(&path).unwrap();
        store.makedirs(&path).unwrap();

        assert!(store.isdir(&path).unwrap());
        assert!(store.isdir(&format!("{}/a/b", root)).unwrap());
        assert_eq!(store.listdir(&format!("{}/a", root)).unwrap(), ["b"]);
    });
}

#[test]
fn test_rmtree_removes_all_descendants() {
    for_each_backend(|store, root| {
        let tree = format!("{}/tree", root);
        write(store, &format!("{}/a.txt", tree), "a");
        write(store, &format!("{}/sub/b.txt", tree), "b");
        store.makedirs(&format!("{}/sub/empty", tree)).unwrap();
        write(store, &format!("{}/tree-sibling.txt", root), "keep");

        store.rmtree(&tree).unwrap();

        assert!(!store.exists(&tree).unwrap());
        assert!(!store.exists(&format!("{}/sub/b.txt", tree)).unwrap());
        assert!(store.glob(&format!("{}/tree/**", root)).unwrap().is_empty());
        assert_eq!(read(store, &format!("{}/tree-sibling.txt", root)), "keep");
    });
}

#[test]
fn test_copyfile_overwrite_semantics() {
    for_each_backend(|store, root| {
        let src = format!("{}/src.txt", root);
        let dst = format!("{}/dst.txt", root);
        write(store, &src, "new");

        store.copyfile(&src, &dst, false).unwrap();
        assert_eq!(read(store, &dst), "new");

        write(store, &dst, "old");
        assert!(matches!(
            store.copyfile(&src, &dst, false),
            Err(StoreError::AlreadyExists(_))
        ));
        assert_eq!(read(store, &dst), "old");

        store.copyfile(&src, &dst, true).unwrap();
        assert_eq!(read(store, &dst), "new");
    });
}

#[test]
fn test_rename_moves_the_file() {
    for_each_backend(|store, root| {
        let src = format!("{}/before.txt", root);
        let dst = format!("{}/after.txt", root);
        write(store, &src, "content");

        store.rename(&src, &dst, false).unwrap();
        assert!(!store.exists(&src).unwrap());
        assert_eq!(read(store, &dst), "content");
    });
}

#[test]
fn test_rename_onto_itself_keeps_the_data() {
    for_each_backend(|store, root| {
        let file = format!("{}/a.txt", root);
        let dir = format!("{}/d", root);
        write(store, &file, "kept");
        write(store, &format!("{}/inner.txt", dir), "inner");

        store.rename(&file, &file, true).unwrap();
        store.copyfile(&file, &file, true).unwrap();
        assert_eq!(read(store, &file), "kept");

        store.rename(&dir, &dir, true).unwrap();
        assert_eq!(read(store, &format!("{}/inner.txt", dir)), "inner");

        assert!(matches!(
            store.rename(&file, &file, false),
            Err(StoreError::AlreadyExists(_))
        ));
    });
}

#[test]
fn test_rename_into_own_subtree_is_rejected() {
    for_each_backend(|store, root| {
        let tree = format!("{}/tree", root);
        write(store, &format!("{}/a.txt", tree), "a");

        assert!(matches!(
            store.rename(&tree, &format!("{}/inner", tree), false),
            Err(StoreError::MoveIntoSelf { .. })
        ));
        assert_eq!(read(store, &format!("{}/a.txt", tree)), "a");
        assert_eq!(store.listdir(&tree).unwrap(), ["a.txt"]);
    });
}

#[test]
fn test_copy_and_move_onto_a_directory_fail() {
    for_each_backend(|store, root| {
        let file = format!("{}/f.txt", root);
        let dir = format!("{}/d", root);
        write(store, &file, "file");
        store.makedirs(&dir).unwrap();

        assert!(matches!(
            store.copyfile(&file, &dir, true),
            Err(StoreError::IsADirectory(_))
        ));
        assert!(matches!(
            store.rename(&file, &dir, true),
            Err(StoreError::IsADirectory(_))
        ));
        assert!(store.isdir(&dir).unwrap());
        assert_eq!(read(store, &file), "file");
    });
}

#[test]
fn test_missing_source_creates_nothing() {
    for_each_backend(|store, root| {
        let missing = format!("{}/missing.txt", root);
        let target = format!("{}/out/deep/copy.txt", root);

        assert!(matches!(
            store.copyfile(&missing, &target, false),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.rename(&missing, &target, false),
            Err(StoreError::NotFound(_))
        ));
        assert!(!store.exists(&format!("{}/out", root)).unwrap());
    });
}

#[test]
fn test_mkdir_below_missing_parent_is_already_exists() {
    for_each_backend(|store, root| {
        store.makedirs(root).unwrap();
        let nested = format!("{}/x/y", root);

        let err = store.mkdir(&nested).unwrap_err();
        assert!(matches!(&err, StoreError::AlreadyExists(_)));
        assert!(err.to_string().contains("missing parent"));
        assert!(!store.exists(&format!("{}/x", root)).unwrap());

        store.mkdir(&format!("{}/x", root)).unwrap();
        store.mkdir(&nested).unwrap();
        assert!(store.isdir(&nested).unwrap());
    });
}

#[test]
fn test_walk_is_top_down_depth_first() {
    for_each_backend(|store, root| {
        let top = format!("{}/walk", root);
        write(store, &format!("{}/f0", top), "");
        write(store, &format!("{}/a/f1", top), "");
        write(store, &format!("{}/a/aa/f2", top), "");
        write(store, &format!("{}/b/f3", top), "");

        let entries: Vec<_> = store.walk(&top).map(Result::unwrap).collect();
        let dirs: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            dirs,
            [
                top.clone(),
                format!("{}/a", top),
                format!("{}/a/aa", top),
                format!("{}/b", top),
            ]
        );
        assert_eq!(entries[0].dirs, ["a", "b"]);
        assert_eq!(entries[0].files, ["f0"]);
        assert_eq!(entries[2].files, ["f2"]);

        assert_eq!(store.walk(&format!("{}/missing", root)).count(), 0);
    });
}

#[test]
fn test_stat_and_kinds() {
    for_each_backend(|store, root| {
        let file = format!("{}/stat/file.bin", root);
        write(store, &file, "1234");

        let stat = store.stat(&file).unwrap();
        assert_eq!(stat.kind, EntryKind::File);
        assert_eq!(stat.size, 4);
        assert_eq!(store.stat(&format!("{}/stat", root)).unwrap().kind, EntryKind::Directory);

        assert!(matches!(
            store.remove(&format!("{}/stat", root)),
            Err(StoreError::IsADirectory(_))
        ));
        assert!(matches!(
            store.stat(&format!("{}/stat/none", root)),
            Err(StoreError::NotFound(_))
        ));
    });
}

#[test]
fn test_text_modes_are_rejected() {
    assert!(matches!("r".parse::<OpenMode>(), Err(StoreError::UnsupportedMode(_))));
    assert!(matches!("w".parse::<OpenMode>(), Err(StoreError::UnsupportedMode(_))));
}

#[test]
fn test_backend_handle_is_created_once_under_concurrency() {
    let connects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connects);
    let store = Arc::new(ObjectPathStore::new("gs://", AnonymousCredentials, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(10));
        Ok(MemoryObjectClient::new())
    }));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let path = format!("gs://bucket/t{}", i);
                let mut file = store.open(&path, OpenMode::Write).unwrap();
                file.write_all(b"x").unwrap();
                file.close().unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert_eq!(store.listdir("gs://bucket").unwrap().len(), 16);
}

#[test]
fn test_credentials_flow_into_the_connector() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.yaml");
    std::fs::write(&path, "token: s3cret\n").unwrap();

    let store = ObjectPathStore::new("gs://", FileCredentialProvider::new(&path), |creds| {
        let token = creds.as_ref().and_then(|c: &Credentials| c.get_str("token"));
        match token {
            Some("s3cret") => Ok(MemoryObjectClient::new()),
            _ => Err(StoreError::Authentication("token rejected".to_string())),
        }
    });
    assert!(!store.exists("gs://bucket/a").unwrap());
}

#[test]
fn test_missing_credentials_surface_as_authentication_error() {
    let dir = tempfile::tempdir().unwrap();
    let provider = FileCredentialProvider::new(dir.path().join("absent.yaml"));
    assert!(matches!(provider.resolve(), Err(StoreError::Authentication(_))));

    let store = ObjectPathStore::new("gs://", provider, |_| Ok(MemoryObjectClient::new()));
    assert!(matches!(
        store.exists("gs://bucket/a"),
        Err(StoreError::Authentication(_))
    ));
}

#[test]
fn test_registry_shares_one_store_per_scheme() {
    let registry = StoreRegistry::with_defaults();
    let store = registry.for_path("mem://bucket/a.txt").unwrap();
    write(store.as_ref(), "mem://bucket/a.txt", "shared");

    let again = registry.for_path("mem://bucket/a.txt").unwrap();
    assert_eq!(read(again.as_ref(), "mem://bucket/a.txt"), "shared");
    assert!(matches!(
        registry.for_path("s3://bucket/a.txt"),
        Err(StoreError::UnsupportedScheme(_))
    ));
}
