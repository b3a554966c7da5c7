use super::*;

use rommend_core::checksum::Hashes;

fn some_hashes() -> Hashes {
    Hashes {
        crc: Some(0xdeadbeef),
        sha1: Some([7; 20]),
        ..Hashes::default()
    }
}

#[test]
fn lookup_misses_then_hits_after_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = CacheRegistry::new(None);

    let cache = registry.cache_for(dir.path());
    assert!(cache.lookup("a.bin", 100, 16).is_none());

    cache.store("a.bin", 100, 16, &some_hashes());
    assert_eq!(cache.lookup("a.bin", 100, 16), Some(some_hashes()));
}

#[test]
fn stale_mtime_or_size_invalidates_entry() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = CacheRegistry::new(None);
    let cache = registry.cache_for(dir.path());

    cache.store("a.bin", 100, 16, &some_hashes());
    assert!(cache.lookup("a.bin", 101, 16).is_none());
    assert!(cache.lookup("a.bin", 100, 17).is_none());
}

#[test]
fn cache_survives_flush_and_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut registry = CacheRegistry::new(None);
        registry
            .cache_for(dir.path())
            .store("sub/a.bin", 100, 16, &some_hashes());
        registry.flush().unwrap();
    }
    assert!(dir.path().join(DEFAULT_CACHE_NAME).exists());

    let mut registry = CacheRegistry::new(None);
    let cache = registry.cache_for(dir.path());
    assert_eq!(cache.lookup("sub/a.bin", 100, 16), Some(some_hashes()));
}

#[test]
fn hashes_for_computes_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = CacheRegistry::new(None);
    let mut calls = 0;

    for _ in 0..3 {
        let hashes = registry
            .hashes_for(dir.path(), "a.bin", 42, 8, || {
                calls += 1;
                Ok(some_hashes())
            })
            .unwrap();
        assert_eq!(hashes, some_hashes());
    }
    assert_eq!(calls, 1);
}

#[test]
fn custom_cache_file_name_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = CacheRegistry::new(Some(".custom.cache".to_string()));
    registry
        .cache_for(dir.path())
        .store("a.bin", 1, 1, &some_hashes());
    registry.flush().unwrap();
    assert!(dir.path().join(".custom.cache").exists());
    assert!(!dir.path().join(DEFAULT_CACHE_NAME).exists());
}

#[test]
fn garbage_cache_file_is_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(DEFAULT_CACHE_NAME), b"not json").unwrap();

    let mut registry = CacheRegistry::new(None);
    let cache = registry.cache_for(dir.path());
    assert!(cache.lookup("a.bin", 1, 1).is_none());
}
