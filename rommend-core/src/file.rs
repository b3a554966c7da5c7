//! File descriptors: one catalog or archive entry with its identity
//! (name, size, digests) and its place in the game family.

use crate::checksum::{HashCompare, Hashes};

/// Dump status recorded in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileStatus {
    #[default]
    Ok,
    /// Known-bad dump; content matches the catalog but the catalog itself
    /// flags it as bad.
    BadDump,
    /// No good dump exists; the file cannot be verified.
    NoDump,
}

impl FileStatus {
    pub fn from_u8(v: u8) -> Option<FileStatus> {
        match v {
            0 => Some(FileStatus::Ok),
            1 => Some(FileStatus::BadDump),
            2 => Some(FileStatus::NoDump),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            FileStatus::Ok => 0,
            FileStatus::BadDump => 1,
            FileStatus::NoDump => 2,
        }
    }
}

/// Where a file lives relative to the game that lists it.
///
/// Values from `InParent` up walk the parent chain; values from `RomSet` up
/// mean "somewhere else in the collection" rather than in the family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Where {
    #[default]
    InZip = 0,
    InParent = 1,
    InGrandparent = 2,
    RomSet = 3,
    Needed = 4,
    Extra = 5,
    Old = 6,
}

impl Where {
    /// One step further up the parent chain. Saturates at grandparent,
    /// the deepest family level the catalog can express.
    pub fn deeper(self) -> Where {
        match self {
            Where::InZip => Where::InParent,
            Where::InParent => Where::InGrandparent,
            other => other,
        }
    }

    /// True for locations outside the game's own family chain.
    pub fn is_elsewhere(self) -> bool {
        self >= Where::RomSet
    }

    pub fn from_u8(v: u8) -> Option<Where> {
        match v {
            0 => Some(Where::InZip),
            1 => Some(Where::InParent),
            2 => Some(Where::InGrandparent),
            3 => Some(Where::RomSet),
            4 => Some(Where::Needed),
            5 => Some(Where::Extra),
            6 => Some(Where::Old),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One expected or encountered file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDesc {
    /// Path within the archive.
    pub name: String,
    /// Name the file takes in the parent game, when inherited.
    pub merge: Option<String>,
    /// Alternate names this entry is also accepted under.
    pub altnames: Vec<String>,
    /// Size in bytes; `None` when the catalog does not record one.
    pub size: Option<u64>,
    pub hashes: Hashes,
    /// Modification time, seconds since the epoch. Runtime-only; not part
    /// of the catalog record.
    pub mtime: i64,
    pub status: FileStatus,
    pub where_: Where,
}

impl FileDesc {
    pub fn new(name: impl Into<String>) -> Self {
        FileDesc {
            name: name.into(),
            ..FileDesc::default()
        }
    }

    /// The name this file takes in its parent game: the merge name when
    /// set, its own name otherwise.
    pub fn merged_name(&self) -> &str {
        self.merge.as_deref().unwrap_or(&self.name)
    }

    pub fn size_known(&self) -> bool {
        self.size.is_some()
    }

    /// Sizes known and equal, and hashes do not disagree on any shared
    /// algorithm.
    pub fn compare_size_hashes(&self, other: &FileDesc) -> bool {
        if self.size.is_none() || self.size != other.size {
            return false;
        }
        self.hashes.compare(&other.hashes) == HashCompare::Match
    }

    /// Same name (or alternate name) and matching size/hashes.
    pub fn compare_name_size_hashes(&self, other: &FileDesc) -> bool {
        self.answers_to(&other.name) && self.compare_size_hashes(other)
    }

    /// Whether `name` is this file's name or one of its alternates.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.altnames.iter().any(|n| n == name)
    }

    /// Whether this file, listed in a child game, is satisfied by `parent`
    /// from the parent game's own file list: the merged name must match the
    /// parent file's name, known sizes must agree, and no shared hash may
    /// disagree. Files with no common algorithm (samples) merge by name.
    pub fn is_mergable(&self, parent: &FileDesc) -> bool {
        if !parent.answers_to(self.merged_name()) {
            return false;
        }
        if let (Some(a), Some(b)) = (self.size, parent.size) {
            if a != b {
                return false;
            }
        }
        self.hashes.compare(&parent.hashes) != HashCompare::Mismatch
    }

    /// Record an alternate name, skipping duplicates.
    pub fn add_altname(&mut self, name: impl Into<String>) {
        let name = name.into();
        if name != self.name && !self.altnames.iter().any(|n| *n == name) {
            self.altnames.push(name);
        }
    }
}

#[cfg(test)]
#[path = "tests/file_tests.rs"]
mod tests;
