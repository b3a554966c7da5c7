//! In-memory donor index: digest → locations across every archive the
//! sweep has touched, plus the old-ROM database.
//!
//! The matcher asks it "where else does a file with these hashes live?"
//! when an expected ROM is missing from its archive. Entries that failed
//! an integrity check are never indexed, so broken files are never picked
//! as copy sources.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rommend_core::checksum::{HashCompare, HashKind, Hashes};

use crate::archive::Archive;

/// Which pool a location belongs to. Mirrors the tail of the `where`
/// ladder: set, needed pool, extra donor tree, old database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    RomSet,
    Needed,
    Extra,
    Old,
}

/// One indexed file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileLocation {
    /// Archive holding the file; `None` for old-database entries, which
    /// exist only as records.
    pub archive: Option<PathBuf>,
    pub index: usize,
    pub source: Source,
    /// Owning game, for old-database entries.
    pub game: Option<String>,
    pub size: Option<u64>,
    pub hashes: Hashes,
}

/// Multi-index over all known file locations.
#[derive(Default)]
pub struct FileIndex {
    by_hash: HashMap<(HashKind, Vec<u8>), Vec<usize>>,
    by_size_crc: HashMap<(u64, u32), Vec<usize>>,
    locations: Vec<FileLocation>,
    indexed: std::collections::HashSet<PathBuf>,
}

impl FileIndex {
    pub fn new() -> Self {
        FileIndex::default()
    }

    /// Whether `archive` has been added already.
    pub fn contains_archive(&self, archive: &Path) -> bool {
        self.indexed.contains(archive)
    }

    /// Index every hashed, unbroken entry of an archive.
    ///
    /// Call after the archive's entries have hashes; entries without any
    /// digest are skipped (they can never be verified as donors).
    pub fn add_archive(&mut self, archive: &Archive, source: Source) {
        if !self.indexed.insert(archive.name().to_path_buf()) {
            return;
        }
        for (i, entry) in archive.entries().iter().enumerate() {
            if entry.broken || entry.desc.hashes.is_empty() {
                continue;
            }
            self.push_location(FileLocation {
                archive: Some(archive.name().to_path_buf()),
                index: i,
                source,
                game: None,
                size: entry.desc.size,
                hashes: entry.desc.hashes.clone(),
            });
        }
    }

    /// Seed old-database entries for one game's files.
    pub fn add_old_game(&mut self, game: &str, files: &[rommend_core::file::FileDesc]) {
        for (i, f) in files.iter().enumerate() {
            if f.hashes.is_empty() {
                continue;
            }
            self.push_location(FileLocation {
                archive: None,
                index: i,
                source: Source::Old,
                game: Some(game.to_string()),
                size: f.size,
                hashes: f.hashes.clone(),
            });
        }
    }

    fn push_location(&mut self, location: FileLocation) {
        let slot = self.locations.len();
        for kind in HashKind::ALL {
            if let Some(bytes) = location.hashes.bytes(kind) {
                self.by_hash.entry((kind, bytes)).or_default().push(slot);
            }
        }
        if let (Some(size), Some(crc)) = (location.size, location.hashes.crc) {
            self.by_size_crc.entry((size, crc)).or_default().push(slot);
        }
        self.locations.push(location);
    }

    /// All locations whose content is compatible with `(size, hashes)`:
    /// sizes must not conflict and every shared algorithm must agree.
    ///
    /// Results preserve insertion order, so earlier-scanned pools win
    /// ties. Filter on [`FileLocation::source`] to restrict the pool.
    pub fn lookup(&self, size: Option<u64>, hashes: &Hashes) -> Vec<&FileLocation> {
        let mut slots: Vec<usize> = Vec::new();

        for kind in HashKind::ALL {
            if let Some(bytes) = hashes.bytes(kind) {
                if let Some(found) = self.by_hash.get(&(kind, bytes)) {
                    slots.extend_from_slice(found);
                }
            }
        }
        if hashes.is_empty() {
            // Hash-poor catalog entry: fall back to the size index when a
            // size is known; nothing else can disambiguate.
            if let Some(size) = size {
                for ((s, _), found) in self.by_size_crc.iter() {
                    if *s == size {
                        slots.extend_from_slice(found);
                    }
                }
            }
        }

        slots.sort_unstable();
        slots.dedup();

        slots
            .into_iter()
            .map(|slot| &self.locations[slot])
            .filter(|loc| {
                if let (Some(a), Some(b)) = (size, loc.size) {
                    if a != b {
                        return false;
                    }
                }
                hashes.is_empty() || hashes.compare(&loc.hashes) == HashCompare::Match
            })
            .collect()
    }

    /// First matching location from a given pool.
    pub fn find_in(
        &self,
        source: Source,
        size: Option<u64>,
        hashes: &Hashes,
    ) -> Option<&FileLocation> {
        self.lookup(size, hashes)
            .into_iter()
            .find(|loc| loc.source == source)
    }
}

/// Which catalog entries want which content: digest → (game, rom index).
///
/// Built once from the reference database; the matcher and fixer use it
/// to decide whether a stray file is worth keeping in the needed pool.
#[derive(Default)]
pub struct CatalogIndex {
    by_hash: HashMap<(HashKind, Vec<u8>), Vec<(String, usize)>>,
}

impl CatalogIndex {
    pub fn new() -> Self {
        CatalogIndex::default()
    }

    /// Index a game's own files (inherited ones are stored with the
    /// parent and indexed there).
    pub fn add_game(&mut self, game: &str, files: &[rommend_core::file::FileDesc]) {
        for (i, f) in files.iter().enumerate() {
            if f.where_ != rommend_core::file::Where::InZip {
                continue;
            }
            for kind in HashKind::ALL {
                if let Some(bytes) = f.hashes.bytes(kind) {
                    self.by_hash
                        .entry((kind, bytes))
                        .or_default()
                        .push((game.to_string(), i));
                }
            }
        }
    }

    /// Games wanting content with these hashes.
    pub fn wanted_by(&self, hashes: &Hashes) -> Vec<&(String, usize)> {
        let mut out = Vec::new();
        for kind in HashKind::ALL {
            if let Some(bytes) = hashes.bytes(kind) {
                if let Some(found) = self.by_hash.get(&(kind, bytes)) {
                    out.extend(found.iter());
                }
            }
        }
        out.sort();
        out.dedup();
        out
    }

    pub fn is_wanted(&self, hashes: &Hashes) -> bool {
        !self.wanted_by(hashes).is_empty()
    }
}

#[cfg(test)]
#[path = "tests/index_tests.rs"]
mod tests;
