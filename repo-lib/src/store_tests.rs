use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tempfile::TempDir;

static INIT_LOGGER: Once = Once::new();

fn init_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

fn create_store() -> (TempDir, ContentStore) {
    init_logging();
    let temp_dir = tempfile::tempdir().unwrap();
    let store_root = temp_dir.path().join("content_store");
    let store = ContentStore::open(&store_root, StoreMode::ReadWrite).unwrap();
    (temp_dir, store)
}

fn put_bytes(store: &ContentStore, uri: &str, payload: &[u8]) -> Name {
    let object = ContentObject::new(
        Name::from_uri(uri).unwrap(),
        payload.to_vec(),
        "application/binary",
    );
    store.put(&object).unwrap()
}

#[test]
fn test_put_get_round_trip() {
    let (_temp_dir, store) = create_store();
    let name = Name::from_uri("/video/a/fileheader").unwrap();
    let object = ContentObject::new(name.clone(), b"header-bytes".to_vec(), "application/binary");

    let stored_name = store.put(&object).unwrap();
    assert_eq!(stored_name, name);

    let got = store.get(&name).unwrap().unwrap();
    assert_eq!(got.payload.as_ref(), b"header-bytes");
    assert_eq!(got.content_type, "application/binary");
    assert_eq!(got.signature, None);
}

#[test]
fn test_get_absent_is_none_not_error() {
    let (_temp_dir, store) = create_store();
    let got = store.get(&Name::from_uri("/nothing/here").unwrap()).unwrap();
    assert!(got.is_none());
}

#[test]
fn test_rename_prefix_and_placeholder_signature() {
    let (_temp_dir, store) = create_store();
    let store = store.with_rename_prefix(Name::from_uri("/mirror").unwrap());

    let original = Name::from_uri("/video/a/nontile/0").unwrap();
    let object = ContentObject::new(original.clone(), b"frame".to_vec(), "application/binary");
    let stored_name = store.put(&object).unwrap();
    assert_eq!(stored_name.to_uri(), "/mirror/video/a/nontile/0");

    // Reads use the literal name: the original name is not present.
    assert!(store.get(&original).unwrap().is_none());

    let got = store.get(&stored_name).unwrap().unwrap();
    assert_eq!(got.payload.as_ref(), b"frame");
    assert_eq!(got.content_type, "application/binary");
    assert_eq!(got.signature.unwrap().as_ref(), &[0u8; PLACEHOLDER_DIGEST_SIZE]);
}

#[test]
fn test_read_exact_mode_matches_get() {
    let (_temp_dir, store) = create_store();
    let name = put_bytes(&store, "/a/b/1", b"one");

    let got = store.read(&ReadRequest::exact(name.clone())).unwrap().unwrap();
    assert_eq!(got.name, name);

    let miss = store
        .read(&ReadRequest::exact(Name::from_uri("/a/b").unwrap()))
        .unwrap();
    assert!(miss.is_none());
}

#[test]
fn test_read_prefix_returns_last_key_of_scan() {
    let (_temp_dir, store) = create_store();
    put_bytes(&store, "/a/b/1", b"one");
    put_bytes(&store, "/a/b/2", b"two");

    let got = store
        .read(&ReadRequest::prefix(Name::from_uri("/a/b").unwrap()))
        .unwrap()
        .unwrap();
    assert_eq!(got.name.to_uri(), "/a/b/2");
    assert_eq!(got.payload.as_ref(), b"two");
}

#[test]
fn test_read_prefix_ordering_is_lexicographic() {
    let (_temp_dir, store) = create_store();
    put_bytes(&store, "/f/10", b"ten");
    put_bytes(&store, "/f/2", b"two");

    // "2" sorts after "10" as a string, so it is the last key scanned.
    let got = store
        .read(&ReadRequest::prefix(Name::from_uri("/f").unwrap()))
        .unwrap()
        .unwrap();
    assert_eq!(got.name.to_uri(), "/f/2");
}

#[test]
fn test_read_prefix_suffix_bounds() {
    let (_temp_dir, store) = create_store();
    put_bytes(&store, "/v/x", b"1");
    put_bytes(&store, "/v/x/y", b"2");
    put_bytes(&store, "/v/x/y/z", b"3");
    let prefix = Name::from_uri("/v").unwrap();

    // Max bound alone: only keys with <= 1 suffix component pass.
    let got = store
        .read(&ReadRequest::prefix(prefix.clone()).with_max_suffix_components(1))
        .unwrap()
        .unwrap();
    assert_eq!(got.name.to_uri(), "/v/x");

    // Min bound alone: the last key with >= 2 suffix components.
    let got = store
        .read(&ReadRequest::prefix(prefix.clone()).with_min_suffix_components(2))
        .unwrap()
        .unwrap();
    assert_eq!(got.name.to_uri(), "/v/x/y/z");

    // Both bounds admit a key when either passes, so the 2-component
    // key is the only one excluded and the 3-component key still wins.
    let got = store
        .read(
            &ReadRequest::prefix(prefix)
                .with_max_suffix_components(1)
                .with_min_suffix_components(3),
        )
        .unwrap()
        .unwrap();
    assert_eq!(got.name.to_uri(), "/v/x/y/z");
}

#[test]
fn test_read_prefix_no_match() {
    let (_temp_dir, store) = create_store();
    put_bytes(&store, "/a/b/1", b"one");

    let got = store
        .read(&ReadRequest::prefix(Name::from_uri("/zzz").unwrap()))
        .unwrap();
    assert!(got.is_none());
}

#[test]
fn test_open_read_only_missing_dir_fails() {
    init_logging();
    let temp_dir = tempfile::tempdir().unwrap();
    let missing = temp_dir.path().join("no_such_store");
    let result = ContentStore::open(&missing, StoreMode::ReadOnly);
    assert!(matches!(result, Err(RepoError::Open(_))));
}

#[test]
fn test_read_only_store_rejects_put() {
    init_logging();
    let temp_dir = tempfile::tempdir().unwrap();
    let store_root = temp_dir.path().join("content_store");
    {
        let store = ContentStore::open(&store_root, StoreMode::ReadWrite).unwrap();
        put_bytes(&store, "/a/b", b"data");
    }

    let store = ContentStore::open(&store_root, StoreMode::ReadOnly).unwrap();
    let got = store.get(&Name::from_uri("/a/b").unwrap()).unwrap().unwrap();
    assert_eq!(got.payload.as_ref(), b"data");

    let object = ContentObject::new(Name::from_uri("/a/c").unwrap(), b"x".to_vec(), "t");
    assert!(matches!(store.put(&object), Err(RepoError::InvalidState(_))));
}

#[test]
fn test_config_file_created_and_reloaded() {
    init_logging();
    let temp_dir = tempfile::tempdir().unwrap();
    let store_root = temp_dir.path().join("content_store");
    {
        let _store = ContentStore::open(&store_root, StoreMode::ReadWrite).unwrap();
    }
    let config_str = std::fs::read_to_string(store_root.join("content_store.json")).unwrap();
    let mut config: StoreConfig = serde_json::from_str(&config_str).unwrap();
    assert!(!config.read_only);

    // A rename prefix in the config takes effect on reopen.
    config.rename_prefix = Some("/mirror".to_string());
    std::fs::write(
        store_root.join("content_store.json"),
        serde_json::to_string(&config).unwrap(),
    )
    .unwrap();

    let store = ContentStore::open(&store_root, StoreMode::ReadWrite).unwrap();
    assert_eq!(store.rename_prefix().unwrap().to_uri(), "/mirror");
}

#[test]
fn test_after_insert_hook() {
    let (_temp_dir, mut store) = create_store();
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_in_hook = seen.clone();
    store.set_after_insert(Box::new(move |name| {
        seen_in_hook.lock().unwrap().push(name.to_uri());
    }));

    put_bytes(&store, "/a/b/1", b"one");
    put_bytes(&store, "/a/b/2", b"two");
    assert_eq!(*seen.lock().unwrap(), vec!["/a/b/1", "/a/b/2"]);
}

#[tokio::test]
async fn test_scan_for_longest_prefixes() {
    let (_temp_dir, store) = create_store();
    put_bytes(&store, "/video/a/nontile/0", b"aaaa");
    put_bytes(&store, "/video/a/nontile/1", b"bbbb");
    put_bytes(&store, "/video/a/tile/0/0/0", b"cc");
    put_bytes(&store, "/audio/x/seg/0", b"d");

    let prefixes = store.scan_for_longest_prefixes().await.unwrap();
    let mut uris: Vec<String> = prefixes.iter().map(|n| n.to_uri()).collect();
    uris.sort();
    assert_eq!(uris, vec!["/audio/x/seg/0", "/video/a"]);

    // Each returned name is a prefix of every key under its branch.
    let video_prefix = Name::from_uri("/video/a").unwrap();
    for key in ["/video/a/nontile/0", "/video/a/nontile/1", "/video/a/tile/0/0/0"] {
        assert!(video_prefix.is_prefix_of(&Name::from_uri(key).unwrap()));
    }

    let stats = store.stats();
    assert_eq!(stats.n_keys, 4);
    assert_eq!(stats.payload_bytes, 4 + 4 + 2 + 1);
}

#[tokio::test]
async fn test_scan_rebuilds_stats_from_scratch() {
    let (_temp_dir, store) = create_store();
    put_bytes(&store, "/a/1", b"xx");
    store.scan_for_longest_prefixes().await.unwrap();
    assert_eq!(store.stats().n_keys, 1);

    put_bytes(&store, "/a/2", b"yy");
    store.scan_for_longest_prefixes().await.unwrap();
    let stats = store.stats();
    assert_eq!(stats.n_keys, 2);
    assert_eq!(stats.payload_bytes, 4);
}

#[test]
fn test_counter_hook_is_send_sync() {
    // The insert hook seam accepts shared-state closures.
    let (_temp_dir, mut store) = create_store();
    let count = Arc::new(AtomicUsize::new(0));
    let count_in_hook = count.clone();
    store.set_after_insert(Box::new(move |_| {
        count_in_hook.fetch_add(1, Ordering::SeqCst);
    }));
    put_bytes(&store, "/n/1", b"1");
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
