//! Integration tests for the store engine

use segkv::store::Store;
use segkv::Error;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const TEST_SEGMENT_SIZE: u64 = 100;
const TEST_KEY: &str = "test-key";
const TEST_VALUE: &str = "test-value";
const TEST_RECORDS: usize = 20;

fn file_count(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

async fn fill(store: &Store) {
    for i in 0..TEST_RECORDS {
        let key = format!("{}{}", TEST_KEY, i);
        store.put(&key, TEST_VALUE).await.unwrap();
    }
}

#[tokio::test]
async fn test_put_and_get_back() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path(), TEST_SEGMENT_SIZE).unwrap();

    for i in 0..TEST_RECORDS {
        let key = format!("{}{}", TEST_KEY, i);
        store.put(&key, TEST_VALUE).await.unwrap();
        assert_eq!(store.get(&key).unwrap(), TEST_VALUE);
    }
    store.close().unwrap();
}

#[tokio::test]
async fn test_overwrite() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path(), TEST_SEGMENT_SIZE).unwrap();
    fill(&store).await;

    store.put("test-key0", "new-value").await.unwrap();
    assert_eq!(store.get("test-key0").unwrap(), "new-value");
    store.close().unwrap();
}

#[tokio::test]
async fn test_segmentation_starts() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path(), TEST_SEGMENT_SIZE).unwrap();
    fill(&store).await;

    let files = file_count(dir.path());
    assert!(files > 1, "segmentation did not start: {} file(s)", files);
    store.close().unwrap();
}

#[tokio::test]
async fn test_compaction_folds_to_two_files() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path(), TEST_SEGMENT_SIZE).unwrap();
    fill(&store).await;

    store.compact().unwrap();

    assert_eq!(file_count(dir.path()), 2);
    for i in 0..TEST_RECORDS {
        let key = format!("{}{}", TEST_KEY, i);
        assert_eq!(store.get(&key).unwrap(), TEST_VALUE, "key {} lost", key);
    }
    store.close().unwrap();
}

#[tokio::test]
async fn test_compaction_keeps_latest_value() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path(), TEST_SEGMENT_SIZE).unwrap();

    store.put("k", "old").await.unwrap();
    fill(&store).await;
    store.put("k", "new").await.unwrap();
    store.compact().unwrap();

    assert_eq!(store.get("k").unwrap(), "new");
    store.close().unwrap();
}

#[tokio::test]
async fn test_recovery_after_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = Store::open(dir.path(), TEST_SEGMENT_SIZE).unwrap();
        fill(&store).await;
        store.put("test-key0", "new-value").await.unwrap();
        store.close().unwrap();
    }

    let store = Store::open(dir.path(), TEST_SEGMENT_SIZE).unwrap();
    assert_eq!(store.get("test-key0").unwrap(), "new-value");
    for i in 1..TEST_RECORDS {
        let key = format!("{}{}", TEST_KEY, i);
        assert_eq!(store.get(&key).unwrap(), TEST_VALUE);
    }
    // writes keep working after recovery
    store.put("after-reopen", "ok").await.unwrap();
    assert_eq!(store.get("after-reopen").unwrap(), "ok");
    store.close().unwrap();
}

#[tokio::test]
async fn test_recovery_after_compaction() {
    let dir = TempDir::new().unwrap();
    {
        let store = Store::open(dir.path(), TEST_SEGMENT_SIZE).unwrap();
        fill(&store).await;
        store.compact().unwrap();
        store.close().unwrap();
    }

    let store = Store::open(dir.path(), TEST_SEGMENT_SIZE).unwrap();
    for i in 0..TEST_RECORDS {
        let key = format!("{}{}", TEST_KEY, i);
        assert_eq!(store.get(&key).unwrap(), TEST_VALUE);
    }
    store.close().unwrap();
}

#[tokio::test]
async fn test_tampered_value_fails_integrity_check() {
    let dir = TempDir::new().unwrap();
    {
        let store = Store::open(dir.path(), 1024).unwrap();
        store.put("k", "v").await.unwrap();
        store.close().unwrap();
    }

    // frame layout: total(4) key_len(4) key(1) val_len(4) value(1) hash(40);
    // flip the low bit of the single value byte, keeping it valid UTF-8
    let path = dir.path().join("current-data0");
    let mut bytes = fs::read(&path).unwrap();
    bytes[13] ^= 0x01;
    fs::write(&path, &bytes).unwrap();

    let store = Store::open(dir.path(), 1024).unwrap();
    match store.get("k") {
        Err(Error::HashMismatch { .. }) => {}
        other => panic!("expected hash mismatch, got {:?}", other),
    }
    store.close().unwrap();
}
