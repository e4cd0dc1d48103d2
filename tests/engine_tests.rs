//! Tests for Engine
//!
//! These tests verify:
//! - Basic get/put/delete operations
//! - Persistence across reopen, including a torn log tail
//! - Log compaction
//! - Concurrent access patterns
//! - Open failures

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use keyserver::config::{StorageMode, SyncStrategy};
use keyserver::engine::{Engine, EngineOptions};
use keyserver::wal::WalRecovery;
use keyserver::KeyServerError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_engine() -> (TempDir, PathBuf, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("keys.log");
    let engine = Engine::open_path(&path).unwrap();
    (temp_dir, path, engine)
}

fn file_options(path: &PathBuf, compaction_threshold: usize) -> EngineOptions {
    EngineOptions {
        storage: StorageMode::File(path.clone()),
        sync_strategy: SyncStrategy::EveryWrite,
        compaction_threshold,
    }
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_engine_memory_put_get() {
    let engine = Engine::memory().unwrap();

    engine.put(b"hello", b"world").unwrap();

    assert_eq!(engine.get(b"hello").unwrap(), Some(b"world".to_vec()));
    assert!(!engine.is_persistent());
    assert_eq!(engine.path(), None);
    assert_eq!(engine.log_size(), 0);
}

#[test]
fn test_engine_get_nonexistent_key() {
    let engine = Engine::memory().unwrap();
    assert_eq!(engine.get(b"nonexistent").unwrap(), None);
}

#[test]
fn test_engine_put_overwrite() {
    let (_temp, _path, engine) = setup_temp_engine();

    engine.put(b"key", b"value1").unwrap();
    engine.put(b"key", b"value2").unwrap();

    assert_eq!(engine.get(b"key").unwrap(), Some(b"value2".to_vec()));
    assert_eq!(engine.entry_count(), 1);
    assert_eq!(engine.dead_records(), 1);
}

#[test]
fn test_engine_delete() {
    let (_temp, _path, engine) = setup_temp_engine();

    engine.put(b"key", b"value").unwrap();
    engine.delete(b"key").unwrap();

    assert_eq!(engine.get(b"key").unwrap(), None);
    assert_eq!(engine.entry_count(), 0);
}

#[test]
fn test_engine_delete_nonexistent_key_writes_nothing() {
    let (_temp, _path, engine) = setup_temp_engine();

    engine.delete(b"nonexistent").unwrap();
    engine.delete(b"nonexistent").unwrap();

    assert_eq!(engine.log_size(), 0);
}

#[test]
fn test_engine_data_size_tracks_live_bytes() {
    let engine = Engine::memory().unwrap();

    engine.put(b"ab", b"1234").unwrap();
    assert_eq!(engine.data_size(), 6);

    engine.put(b"ab", b"12").unwrap();
    assert_eq!(engine.data_size(), 4);

    engine.delete(b"ab").unwrap();
    assert_eq!(engine.data_size(), 0);
}

#[test]
fn test_engine_binary_data() {
    let engine = Engine::memory().unwrap();

    let key = b"\x00\x01\x02\xFF\xFE";
    let value = b"\xFF\x00\xAB\xCD\x00";

    engine.put(key, value).unwrap();
    assert_eq!(engine.get(key).unwrap(), Some(value.to_vec()));
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_engine_reopen_recovers_data() {
    let (_temp, path, engine) = setup_temp_engine();

    engine.put(b"key1", b"value1").unwrap();
    engine.put(b"key2", b"value2").unwrap();
    engine.delete(b"key1").unwrap();
    drop(engine);

    let engine = Engine::open_path(&path).unwrap();
    assert_eq!(engine.get(b"key1").unwrap(), None);
    assert_eq!(engine.get(b"key2").unwrap(), Some(b"value2".to_vec()));
    assert_eq!(engine.dead_records(), 2);
}

#[test]
fn test_engine_reopen_after_torn_write() {
    let (_temp, path, engine) = setup_temp_engine();

    engine.put(b"key1", b"value1").unwrap();
    engine.put(b"key2", b"value2").unwrap();
    drop(engine);

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0xAA; 7]).unwrap();
    drop(file);

    let engine = Engine::open_path(&path).unwrap();
    assert_eq!(engine.get(b"key1").unwrap(), Some(b"value1".to_vec()));
    assert_eq!(engine.get(b"key2").unwrap(), Some(b"value2".to_vec()));

    // Writes after recovery land after the truncation point
    engine.put(b"key3", b"value3").unwrap();
    drop(engine);

    let engine = Engine::open_path(&path).unwrap();
    assert_eq!(engine.entry_count(), 3);
}

#[test]
fn test_engine_open_refuses_damaged_length_field() {
    let (_temp, path, engine) = setup_temp_engine();
    for i in 0..5u8 {
        engine.put(&[i], &[i; 32]).unwrap();
    }
    drop(engine);
    let len_before = std::fs::metadata(&path).unwrap().len();

    let mut data = std::fs::read(&path).unwrap();
    data[15] = 0x7F;
    std::fs::write(&path, data).unwrap();

    let err = Engine::open_path(&path).unwrap_err();
    assert!(matches!(err, KeyServerError::StorageOpen(_)));
    assert_eq!(std::fs::metadata(&path).unwrap().len(), len_before);
}

#[test]
fn test_engine_open_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("dir").join("keys.log");

    let engine = Engine::open_path(&path).unwrap();
    engine.put(b"k", b"v").unwrap();

    assert!(path.exists());
    assert_eq!(engine.path(), Some(path.as_path()));
}

#[test]
fn test_engine_open_on_directory_fails() {
    let temp_dir = TempDir::new().unwrap();

    let err = Engine::open_path(temp_dir.path()).unwrap_err();
    assert!(matches!(err, KeyServerError::StorageOpen(_)));
}

// =============================================================================
// Compaction Tests
// =============================================================================

#[test]
fn test_engine_compacts_at_threshold() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("keys.log");
    let engine = Engine::open(file_options(&path, 4)).unwrap();

    for i in 0..5u8 {
        engine.put(b"key", &[i]).unwrap();
    }

    assert_eq!(engine.dead_records(), 0);
    assert_eq!(WalRecovery::verify(&path).unwrap().entries_recovered, 1);
    assert_eq!(engine.get(b"key").unwrap(), Some(vec![4]));
}

#[test]
fn test_engine_write_survives_failed_compaction() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("keys.log");
    // A directory where the rewrite wants its temp file makes compaction fail
    let blocker = path.with_extension("compact");
    std::fs::create_dir(&blocker).unwrap();

    let engine = Engine::open(file_options(&path, 2)).unwrap();
    for i in 0..3u8 {
        engine.put(b"key", &[i]).unwrap();
    }
    engine.put(b"other", b"x").unwrap();
    engine.delete(b"other").unwrap();

    assert_eq!(engine.get(b"key").unwrap(), Some(vec![2]));
    assert_eq!(engine.dead_records(), 4);

    std::fs::remove_dir(&blocker).unwrap();
    engine.put(b"key", &[3]).unwrap();
    assert_eq!(engine.dead_records(), 0);
    drop(engine);

    let engine = Engine::open_path(&path).unwrap();
    assert_eq!(engine.get(b"key").unwrap(), Some(vec![3]));
    assert_eq!(engine.get(b"other").unwrap(), None);
}

#[test]
fn test_engine_close_compacts_log() {
    let (_temp, path, engine) = setup_temp_engine();

    engine.put(b"a", b"1").unwrap();
    engine.put(b"a", b"2").unwrap();
    engine.put(b"b", b"3").unwrap();
    engine.delete(b"b").unwrap();
    engine.close().unwrap();

    let result = WalRecovery::verify(&path).unwrap();
    assert_eq!(result.entries_recovered, 1);

    let engine = Engine::open_path(&path).unwrap();
    assert_eq!(engine.get(b"a").unwrap(), Some(b"2".to_vec()));
    assert_eq!(engine.get(b"b").unwrap(), None);
}

#[test]
fn test_engine_compacts_on_open_when_log_is_mostly_dead() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("keys.log");

    let engine = Engine::open(file_options(&path, 1000)).unwrap();
    for i in 0..10u8 {
        engine.put(b"key", &[i]).unwrap();
    }
    drop(engine);

    let engine = Engine::open(file_options(&path, 5)).unwrap();
    assert_eq!(engine.dead_records(), 0);
    assert_eq!(WalRecovery::verify(&path).unwrap().entries_recovered, 1);
    assert_eq!(engine.get(b"key").unwrap(), Some(vec![9]));
}

// =============================================================================
// Concurrent Access Tests
// =============================================================================

#[test]
fn test_engine_concurrent_writes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("keys.log");
    let engine = Arc::new(Engine::open(file_options(&path, 16)).unwrap());

    let mut handles = vec![];
    for t in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for i in 0..25 {
                let key = format!("thread{}_key{}", t, i);
                let value = format!("thread{}_value{}", t, i);
                engine.put(key.as_bytes(), value.as_bytes()).unwrap();
                engine.put(key.as_bytes(), value.as_bytes()).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.entry_count(), 100);
    drop(engine);

    let engine = Engine::open_path(&path).unwrap();
    for t in 0..4 {
        for i in 0..25 {
            let key = format!("thread{}_key{}", t, i);
            let expected = format!("thread{}_value{}", t, i);
            assert_eq!(
                engine.get(key.as_bytes()).unwrap(),
                Some(expected.into_bytes())
            );
        }
    }
}

#[test]
fn test_engine_concurrent_reads_during_writes() {
    let engine = Arc::new(Engine::memory().unwrap());
    engine.put(b"stable", b"value").unwrap();

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 0..500u32 {
                engine.put(&i.to_be_bytes(), b"x").unwrap();
            }
        })
    };

    let mut readers = vec![];
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        readers.push(thread::spawn(move || {
            for _ in 0..500 {
                assert_eq!(engine.get(b"stable").unwrap(), Some(b"value".to_vec()));
            }
        }));
    }

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(engine.entry_count(), 501);
}
