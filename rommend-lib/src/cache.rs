//! Persistent per-directory hash cache.
//!
//! Hashing a full ROM set dominates check time, so every registered
//! directory keeps a JSON cache file mapping relative paths (including
//! `archive.zip/entry` paths) to `(mtime, size, hashes)`. A cache is
//! trusted only while the directory's own mtime matches the recorded one,
//! and each entry additionally revalidates its file's mtime and size.
//! A version bump wipes stale caches wholesale.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use rommend_core::checksum::{HashKind, Hashes};

use crate::error::LibError;

/// Cache format version. Bump when the stored shape changes; mismatched
/// caches are discarded and rebuilt.
const CACHE_VERSION: u32 = 1;

/// Default name of the cache file inside each registered directory.
pub const DEFAULT_CACHE_NAME: &str = ".rommend-cache.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedHashes {
    crc: Option<String>,
    md5: Option<String>,
    sha1: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    mtime: i64,
    size: u64,
    hashes: CachedHashes,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    version: u32,
    /// mtime of the directory when the cache was written.
    #[serde(default)]
    dir_mtime: i64,
    entries: HashMap<String, CacheEntry>,
}

/// One directory's cache, loaded lazily and written back on flush.
pub struct DirCache {
    root: PathBuf,
    file_name: String,
    data: CacheFile,
    dirty: bool,
}

impl DirCache {
    fn open(root: &Path, file_name: &str) -> DirCache {
        let path = root.join(file_name);
        let dir_mtime = mtime_of(root).unwrap_or(0);

        let data = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<CacheFile>(&contents) {
                Ok(data) if data.version == CACHE_VERSION && data.dir_mtime == dir_mtime => data,
                Ok(_) => {
                    debug!("cache {} is stale, rebuilding", path.display());
                    CacheFile::default()
                }
                Err(e) => {
                    debug!("cache {} is unreadable ({}), rebuilding", path.display(), e);
                    CacheFile::default()
                }
            },
            Err(_) => CacheFile::default(),
        };

        DirCache {
            root: root.to_path_buf(),
            file_name: file_name.to_string(),
            data,
            dirty: false,
        }
    }

    /// Cached hashes for `rel_path`, if still valid against the observed
    /// mtime and size.
    pub fn lookup(&self, rel_path: &str, mtime: i64, size: u64) -> Option<Hashes> {
        let entry = self.data.entries.get(rel_path)?;
        if entry.mtime != mtime || entry.size != size {
            return None;
        }
        let mut hashes = Hashes::new();
        if let Some(ref hex) = entry.hashes.crc {
            hashes.set_hex(HashKind::Crc, hex).ok()?;
        }
        if let Some(ref hex) = entry.hashes.md5 {
            hashes.set_hex(HashKind::Md5, hex).ok()?;
        }
        if let Some(ref hex) = entry.hashes.sha1 {
            hashes.set_hex(HashKind::Sha1, hex).ok()?;
        }
        Some(hashes)
    }

    pub fn store(&mut self, rel_path: &str, mtime: i64, size: u64, hashes: &Hashes) {
        self.data.entries.insert(
            rel_path.to_string(),
            CacheEntry {
                mtime,
                size,
                hashes: CachedHashes {
                    crc: hashes.hex(HashKind::Crc),
                    md5: hashes.hex(HashKind::Md5),
                    sha1: hashes.hex(HashKind::Sha1),
                },
            },
        );
        self.dirty = true;
    }

    pub fn forget(&mut self, rel_path: &str) {
        if self.data.entries.remove(rel_path).is_some() {
            self.dirty = true;
        }
    }

    fn flush(&mut self) -> Result<(), LibError> {
        if !self.dirty {
            return Ok(());
        }
        self.data.version = CACHE_VERSION;

        let path = self.root.join(&self.file_name);
        // Creating the cache file bumps the directory mtime; make sure it
        // exists before recording the mtime, since overwriting an existing
        // entry leaves the directory untouched.
        if !path.exists() {
            fs::write(&path, b"").map_err(LibError::io_at(&path))?;
        }
        self.data.dir_mtime = mtime_of(&self.root).unwrap_or(0);

        let contents = serde_json::to_string(&self.data)
            .map_err(|e| LibError::def(format!("cache encode failed: {}", e)))?;
        fs::write(&path, contents).map_err(LibError::io_at(&path))?;
        self.dirty = false;
        Ok(())
    }
}

/// All directory caches for one run, keyed by registered root.
///
/// Lives in the check context; opened on first use and flushed once at
/// shutdown.
pub struct CacheRegistry {
    file_name: String,
    caches: HashMap<PathBuf, DirCache>,
}

impl CacheRegistry {
    pub fn new(file_name: Option<String>) -> Self {
        CacheRegistry {
            file_name: file_name.unwrap_or_else(|| DEFAULT_CACHE_NAME.to_string()),
            caches: HashMap::new(),
        }
    }

    /// Name of the cache file; directory scans skip it.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn cache_for(&mut self, root: &Path) -> &mut DirCache {
        let file_name = self.file_name.clone();
        self.caches
            .entry(root.to_path_buf())
            .or_insert_with(|| DirCache::open(root, &file_name))
    }

    /// Cached hashes, or compute-and-store via `compute`.
    pub fn hashes_for(
        &mut self,
        root: &Path,
        rel_path: &str,
        mtime: i64,
        size: u64,
        compute: impl FnOnce() -> Result<Hashes, LibError>,
    ) -> Result<Hashes, LibError> {
        let cache = self.cache_for(root);
        if let Some(hashes) = cache.lookup(rel_path, mtime, size) {
            return Ok(hashes);
        }
        let hashes = compute()?;
        cache.store(rel_path, mtime, size, &hashes);
        Ok(hashes)
    }

    /// Write every dirty cache back to disk.
    pub fn flush(&mut self) -> Result<(), LibError> {
        for cache in self.caches.values_mut() {
            cache.flush()?;
        }
        Ok(())
    }
}

/// mtime of `path` in seconds since the epoch, if it can be read.
pub fn mtime_of(path: &Path) -> Option<i64> {
    let meta = fs::metadata(path).ok()?;
    let mtime = meta.modified().ok()?;
    match mtime.duration_since(std::time::UNIX_EPOCH) {
        Ok(d) => Some(d.as_secs() as i64),
        Err(_) => Some(0),
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
