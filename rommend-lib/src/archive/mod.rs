//! A uniform, transactional view over per-game containers.
//!
//! An [`Archive`] is either a zip file or a plain directory; the backend
//! is a tag and every operation dispatches on it. Mutations never touch
//! the final on-disk names until [`Archive::commit`]; until then they
//! accumulate in a change log with staged sidecar files, and
//! [`Archive::rollback`] restores the pre-mutation state.

pub mod change;
mod dir;
mod zip;

use std::io::Write;
use std::path::{Path, PathBuf};

use rommend_core::checksum::{HashKind, Hashes};
use rommend_core::file::FileDesc;
use rommend_core::util::{ensure_dir, ensure_parent_dir, flatten_name, unique_path};

use crate::cache::CacheRegistry;
use crate::error::LibError;

pub use change::{Change, DataSource, StagedOriginal};

/// What the archive holds; affects default layout and reporting only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Rom,
    Sample,
    Disk,
}

/// Backend tag. Dispatch is by match on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Dir,
    Zip,
}

/// Open-time options.
#[derive(Debug, Clone, Default)]
pub struct OpenFlags {
    pub writable: bool,
    /// Allow the container to be created on first mutation/commit.
    pub create: bool,
    /// Verify stored entry CRCs against recomputed data on open.
    pub check_integrity: bool,
    /// Never remove the container even when it commits empty.
    pub keep_empty: bool,
    /// Directory backend: do not recurse into subdirectories.
    pub top_level_only: bool,
    /// File name to skip when listing a directory (the hash cache).
    pub skip_file: Option<String>,
    /// Directory backend: skip zip files (they are archives themselves).
    pub skip_zips: bool,
}

/// Lifecycle of an entry within the change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    InGame,
    Added,
    Deleted,
}

/// One file of an archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub desc: FileDesc,
    pub state: EntryState,
    /// Integrity check failed; the entry is unusable as content.
    pub broken: bool,
}

/// A zip or directory container with transactional mutation.
pub struct Archive {
    name: PathBuf,
    kind: ArchiveKind,
    backend: BackendKind,
    flags: OpenFlags,
    entries: Vec<ArchiveEntry>,
    changes: Vec<Change>,
    /// Container mtime at open/commit, used as cache validity for zip
    /// entries.
    mtime: i64,
    modified: bool,
}

impl Archive {
    /// Open a container. A missing container yields an empty archive when
    /// `flags.create` is set and an error otherwise.
    pub fn open(
        path: &Path,
        backend: BackendKind,
        kind: ArchiveKind,
        flags: OpenFlags,
    ) -> Result<Archive, LibError> {
        let mut archive = Archive {
            name: path.to_path_buf(),
            kind,
            backend,
            flags,
            entries: Vec::new(),
            changes: Vec::new(),
            mtime: crate::cache::mtime_of(path).unwrap_or(0),
            modified: false,
        };

        let exists = path.exists();
        if !exists {
            if archive.flags.create {
                return Ok(archive);
            }
            return Err(LibError::zip(path, "no such archive"));
        }

        match backend {
            BackendKind::Dir => dir::read_entries(&mut archive)?,
            BackendKind::Zip => zip::read_entries(&mut archive)?,
        }
        archive.changes = vec![Change::Unchanged; archive.entries.len()];

        if archive.flags.check_integrity {
            if let BackendKind::Zip = backend {
                zip::check_integrity(&mut archive)?;
            }
        }

        Ok(archive)
    }

    pub fn name(&self) -> &Path {
        &self.name
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn is_writable(&self) -> bool {
        self.flags.writable
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> &ArchiveEntry {
        &self.entries[index]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the first live entry currently named `name`.
    pub fn find_entry(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.state != EntryState::Deleted && e.desc.name == name)
    }

    /// The name the entry will carry after commit.
    pub fn effective_name(&self, index: usize) -> &str {
        self.changes
            .get(index)
            .and_then(|c| c.new_name())
            .unwrap_or(&self.entries[index].desc.name)
    }

    /// Whether a file named `name` will exist in the archive after the
    /// pending changes commit.
    pub fn will_exist_after_commit(&self, name: &str) -> bool {
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.state == EntryState::Deleted {
                continue;
            }
            if self.effective_name(i) == name {
                return true;
            }
        }
        if self.backend == BackendKind::Dir {
            // Untracked files on disk collide too.
            return self.name.join(name).exists();
        }
        false
    }

    // -- reading ----------------------------------------------------------

    /// Stream `length` bytes (or to the end) of the entry's original
    /// content starting at `start` into `sink`, returning bytes written
    /// and their digests.
    pub fn read_range(
        &self,
        index: usize,
        start: u64,
        length: Option<u64>,
        sink: &mut dyn Write,
    ) -> Result<(u64, Hashes), LibError> {
        match self.backend {
            BackendKind::Dir => dir::read_range(self, index, start, length, sink),
            BackendKind::Zip => zip::read_range(self, index, start, length, sink),
        }
    }

    /// Digests of the entry's first `limit` bytes (or all of it).
    pub fn hash_entry(&self, index: usize, limit: Option<u64>) -> Result<(u64, Hashes), LibError> {
        self.read_range(index, 0, limit, &mut std::io::sink())
    }

    /// Digests of `length` bytes starting at `start`; used for header
    /// detectors.
    pub fn hash_region(
        &self,
        index: usize,
        start: u64,
        length: Option<u64>,
    ) -> Result<(u64, Hashes), LibError> {
        self.read_range(index, start, length, &mut std::io::sink())
    }

    /// Make sure the entry's descriptor carries every digest kind in
    /// `kinds`, consulting and feeding the per-directory cache when one
    /// is supplied as `(registry, registered_root)`.
    pub fn ensure_hashes(
        &mut self,
        index: usize,
        kinds: u8,
        cache: Option<(&mut CacheRegistry, &Path)>,
    ) -> Result<(), LibError> {
        let entry = &self.entries[index];
        if entry.broken || entry.desc.hashes.kinds() & kinds == kinds {
            return Ok(());
        }

        let computed = match cache {
            Some((registry, root)) => {
                let rel = self.cache_key(root, index);
                let (mtime, size) = self.cache_validity(index);
                let this: &Archive = self;
                registry.hashes_for(root, &rel, mtime, size, || {
                    this.hash_entry(index, None).map(|(_, h)| h)
                })?
            }
            None => self.hash_entry(index, None).map(|(_, h)| h)?,
        };

        let entry = &mut self.entries[index];
        // A zip entry whose recomputed CRC disagrees with the one stored
        // in the central directory is unusable content.
        if let (Some(stored), Some(fresh)) = (entry.desc.hashes.crc, computed.crc) {
            if stored != fresh {
                entry.broken = true;
                return Ok(());
            }
        }
        entry.desc.hashes.merge(&computed);
        Ok(())
    }

    fn cache_key(&self, root: &Path, index: usize) -> String {
        let rel = self
            .name
            .strip_prefix(root)
            .unwrap_or(&self.name)
            .to_string_lossy()
            .into_owned();
        match self.backend {
            BackendKind::Dir => {
                if rel.is_empty() {
                    self.entries[index].desc.name.clone()
                } else {
                    format!("{}/{}", rel, self.entries[index].desc.name)
                }
            }
            BackendKind::Zip => format!("{}/{}", rel, self.entries[index].desc.name),
        }
    }

    fn cache_validity(&self, index: usize) -> (i64, u64) {
        let entry = &self.entries[index];
        match self.backend {
            BackendKind::Dir => (entry.desc.mtime, entry.desc.size.unwrap_or(0)),
            BackendKind::Zip => (self.mtime, entry.desc.size.unwrap_or(0)),
        }
    }

    // -- mutation ---------------------------------------------------------

    /// Append an empty file.
    pub fn file_add_empty(&mut self, name: &str) -> Result<usize, LibError> {
        self.check_writable()?;
        if self.will_exist_after_commit(name) {
            return Err(LibError::zip_file(&self.name, name, "file already exists"));
        }
        let mut desc = FileDesc::new(name);
        desc.size = Some(0);
        desc.hashes = rommend_core::checksum::Hasher::new().finalize();
        self.push_added(desc, DataSource::Empty);
        Ok(self.entries.len() - 1)
    }

    /// Copy (part of) an entry of `source` in as a new entry named
    /// `name`. `length == None` means to the end of the source entry.
    pub fn file_copy_from(
        &mut self,
        source: &Archive,
        source_index: usize,
        name: &str,
        start: u64,
        length: Option<u64>,
    ) -> Result<usize, LibError> {
        self.check_writable()?;
        if self.will_exist_after_commit(name) {
            return Err(LibError::zip_file(&self.name, name, "file already exists"));
        }

        let (desc, data) = self.stage_copy(source, source_index, name, start, length)?;
        self.push_added(desc, data);
        Ok(self.entries.len() - 1)
    }

    /// Duplicate one of this archive's own entries under a new name.
    pub fn file_copy_within(&mut self, source_index: usize, name: &str) -> Result<usize, LibError> {
        self.check_writable()?;
        if self.will_exist_after_commit(name) {
            return Err(LibError::zip_file(&self.name, name, "file already exists"));
        }

        let source_desc = self.entries[source_index].desc.clone();
        let data = match self.backend {
            BackendKind::Zip => DataSource::ZipEntry {
                archive: self.name.clone(),
                entry: source_desc.name.clone(),
            },
            BackendKind::Dir => {
                let source_path = dir::original_data_path(self, source_index);
                let stage_path = self.make_stage_path(name)?;
                dir::link_or_copy(&source_path, &stage_path)?;
                DataSource::File(stage_path)
            }
        };

        let mut desc = FileDesc::new(name);
        desc.size = source_desc.size;
        desc.hashes = source_desc.hashes.clone();
        self.push_added(desc, data);
        Ok(self.entries.len() - 1)
    }

    /// Replace the entry at `index` with a subsection of its own original
    /// content, under (possibly) a new name. This is the long-file fix:
    /// the valid prefix survives, the rest goes.
    pub fn file_extract_range(
        &mut self,
        index: usize,
        name: &str,
        start: u64,
        length: u64,
    ) -> Result<(), LibError> {
        self.check_writable()?;
        if self.entries[index].state == EntryState::Deleted {
            return Err(self.entry_error(index, "cannot replace deleted file"));
        }
        if name != self.entries[index].desc.name && self.will_exist_after_commit(name) {
            return Err(LibError::zip_file(&self.name, name, "file already exists"));
        }

        let stage_path = self.make_stage_path(name)?;
        let mut out =
            std::fs::File::create(&stage_path).map_err(LibError::io_at(&stage_path))?;
        let (written, hashes) = self.read_range(index, start, Some(length), &mut out)?;
        out.sync_all().map_err(LibError::io_at(&stage_path))?;
        drop(out);
        if written != length {
            let _ = std::fs::remove_file(&stage_path);
            return Err(self.entry_error(index, "source shorter than requested range"));
        }

        let mut desc = FileDesc::new(name);
        desc.size = Some(length);
        desc.hashes = hashes;

        let original = match self.backend {
            BackendKind::Dir => {
                if name != self.entries[index].desc.name {
                    Some(dir::move_original_aside(self, index)?)
                } else {
                    None
                }
            }
            BackendKind::Zip => None,
        };

        self.changes[index] = Change::Replaced {
            desc,
            data: DataSource::File(stage_path),
            original,
        };
        self.modified = true;
        Ok(())
    }

    /// Mark the entry deleted. The bytes survive in the change log until
    /// commit, so pending copies out of this archive still work.
    pub fn file_delete(&mut self, index: usize) -> Result<(), LibError> {
        self.check_writable()?;
        let entry = &self.entries[index];
        if entry.state == EntryState::Deleted {
            return Ok(());
        }
        if entry.state == EntryState::Added {
            return Err(self.entry_error(index, "cannot delete a file pending addition"));
        }

        let original = match self.backend {
            BackendKind::Dir => Some(dir::move_original_aside(self, index)?),
            BackendKind::Zip => None,
        };
        self.changes[index] = Change::Deleted { original };
        self.entries[index].state = EntryState::Deleted;
        self.modified = true;
        Ok(())
    }

    /// Rename the entry at `index`, verifying the destination will not
    /// collide with any post-commit file.
    pub fn file_rename(&mut self, index: usize, name: &str) -> Result<(), LibError> {
        self.check_writable()?;
        if self.entries[index].state == EntryState::Deleted {
            return Err(self.entry_error(index, "cannot rename deleted file"));
        }
        if self.will_exist_after_commit(name) {
            return Err(LibError::zip_file(
                &self.name,
                name,
                format!(
                    "cannot rename '{}': destination exists",
                    self.entries[index].desc.name
                ),
            ));
        }

        let original = match self.backend {
            BackendKind::Dir => Some(dir::move_original_aside(self, index)?),
            BackendKind::Zip => None,
        };
        self.changes[index] = Change::Renamed {
            name: name.to_string(),
            original,
        };
        self.modified = true;
        Ok(())
    }

    /// Apply the change log in order.
    ///
    /// Directory backend: stops at the first failing index; changes
    /// already applied stay applied, the rest keep their staged state.
    /// Zip backend: the archive is rewritten and renamed into place, so
    /// either every change lands or none does; on failure all pending
    /// changes are discarded.
    pub fn commit(&mut self) -> Result<(), LibError> {
        if !self.modified {
            return Ok(());
        }
        let result = match self.backend {
            BackendKind::Dir => dir::commit(self),
            BackendKind::Zip => zip::commit(self),
        };
        self.compact();
        if result.is_ok() {
            self.modified = false;
            self.mtime = crate::cache::mtime_of(&self.name).unwrap_or(0);
            if self.backend == BackendKind::Zip {
                for entry in &mut self.entries {
                    entry.desc.mtime = self.mtime;
                }
            }
        }
        result
    }

    /// Close the archive. Anything staged but not committed is rolled
    /// back first, so no sidecars survive the handle.
    pub fn close(mut self) -> Result<(), LibError> {
        if self.modified {
            self.rollback()
        } else {
            Ok(())
        }
    }

    /// Undo every pending change, restoring the pre-mutation state.
    pub fn rollback(&mut self) -> Result<(), LibError> {
        let result = match self.backend {
            BackendKind::Dir => dir::rollback(self),
            BackendKind::Zip => zip::discard_changes(self),
        };
        self.compact();
        self.modified = false;
        result
    }

    // -- internals --------------------------------------------------------

    fn check_writable(&self) -> Result<(), LibError> {
        if self.flags.writable {
            Ok(())
        } else {
            Err(LibError::zip(&self.name, "archive is read-only"))
        }
    }

    fn entry_error(&self, index: usize, detail: &str) -> LibError {
        LibError::zip_file(&self.name, self.entries[index].desc.name.clone(), detail)
    }

    fn push_added(&mut self, desc: FileDesc, data: DataSource) {
        self.entries.push(ArchiveEntry {
            desc,
            state: EntryState::Added,
            broken: false,
        });
        self.changes.push(Change::Added { data });
        self.modified = true;
    }

    /// Decide how to stage a copy: zero-copy zip-to-zip when possible,
    /// a materialized sidecar otherwise. Returns the new entry's
    /// descriptor and data source.
    fn stage_copy(
        &mut self,
        source: &Archive,
        source_index: usize,
        name: &str,
        start: u64,
        length: Option<u64>,
    ) -> Result<(FileDesc, DataSource), LibError> {
        let source_entry = &source.entries[source_index];
        let full_range = start == 0
            && (length.is_none() || length == source_entry.desc.size);

        if self.backend == BackendKind::Zip && source.backend == BackendKind::Zip && full_range {
            let mut desc = FileDesc::new(name);
            desc.size = source_entry.desc.size;
            desc.hashes = source_entry.desc.hashes.clone();
            return Ok((
                desc,
                DataSource::ZipEntry {
                    archive: source.name.clone(),
                    entry: source_entry.desc.name.clone(),
                },
            ));
        }

        let stage_path = self.make_stage_path(name)?;

        if self.backend == BackendKind::Dir && source.backend == BackendKind::Dir && full_range {
            // Hardlink when possible, byte copy otherwise.
            let source_path = dir::original_data_path(source, source_index);
            dir::link_or_copy(&source_path, &stage_path)?;
            let mut desc = FileDesc::new(name);
            desc.size = source_entry.desc.size;
            desc.hashes = source_entry.desc.hashes.clone();
            return Ok((desc, DataSource::File(stage_path)));
        }

        let mut out =
            std::fs::File::create(&stage_path).map_err(LibError::io_at(&stage_path))?;
        let (written, hashes) = source.read_range(source_index, start, length, &mut out)?;
        out.sync_all().map_err(LibError::io_at(&stage_path))?;
        drop(out);

        if let Some(expected) = length {
            if written != expected {
                let _ = std::fs::remove_file(&stage_path);
                return Err(source.entry_error(source_index, "source shorter than requested range"));
            }
        }

        let mut desc = FileDesc::new(name);
        desc.size = Some(written);
        if full_range && !source_entry.desc.hashes.is_empty() {
            desc.hashes = source_entry.desc.hashes.clone();
        } else {
            desc.hashes = hashes;
        }
        Ok((desc, DataSource::File(stage_path)))
    }

    /// A unique sidecar path next to (dir: inside) the container for
    /// staging `name`'s bytes.
    fn make_stage_path(&self, name: &str) -> Result<PathBuf, LibError> {
        match self.backend {
            BackendKind::Dir => {
                ensure_dir(&self.name).map_err(LibError::io_at(&self.name))?;
                let base = self.name.join(flatten_name(name));
                unique_path(&base).map_err(LibError::io_at(&self.name))
            }
            BackendKind::Zip => {
                ensure_parent_dir(&self.name).map_err(LibError::io_at(&self.name))?;
                let mut base = self.name.as_os_str().to_os_string();
                base.push(".");
                base.push(flatten_name(name));
                unique_path(Path::new(&base)).map_err(LibError::io_at(&self.name))
            }
        }
    }

    /// Drop entries whose deletion has been applied or whose addition
    /// was undone, and realign the change log.
    fn compact(&mut self) {
        let mut keep = Vec::with_capacity(self.entries.len());
        let mut changes = Vec::with_capacity(self.entries.len());
        for (entry, change) in self.entries.drain(..).zip(self.changes.drain(..)) {
            let drop_entry = match entry.state {
                EntryState::Deleted => change.is_unchanged(),
                EntryState::Added => change.is_unchanged(),
                EntryState::InGame => false,
            };
            if !drop_entry {
                keep.push(entry);
                changes.push(change);
            }
        }
        self.entries = keep;
        self.changes = changes;
    }

    /// Remove every staged sidecar still referenced by the change log.
    pub(super) fn remove_staged_files(&mut self) {
        for change in &self.changes {
            if let Some(DataSource::File(path)) = change.data() {
                let _ = std::fs::remove_file(path);
            }
        }
    }
}

impl Drop for Archive {
    fn drop(&mut self) {
        // Abandoned archives must not leave sidecars or moved-aside
        // originals behind.
        if self.modified {
            let _ = self.rollback();
        }
    }
}

/// Copy `length` bytes (or to the end) from `reader` into `sink` after
/// discarding `skip` bytes, hashing what was copied. Shared by both
/// backends' `read_range`.
pub(super) fn copy_hashing(
    reader: &mut dyn std::io::Read,
    skip: u64,
    length: Option<u64>,
    sink: &mut dyn Write,
) -> Result<(u64, Hashes), LibError> {
    let mut to_skip = skip;
    let mut skip_buf = [0u8; 8192];
    while to_skip > 0 {
        let want = (to_skip as usize).min(skip_buf.len());
        let n = reader
            .read(&mut skip_buf[..want])
            .map_err(|e| LibError::sys("skip in archive entry", e))?;
        if n == 0 {
            break;
        }
        to_skip -= n as u64;
    }

    let mut hasher = rommend_core::checksum::Hasher::new();
    let mut remaining = length;
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let want = match remaining {
            Some(0) => break,
            Some(n) => (n as usize).min(buf.len()),
            None => buf.len(),
        };
        let n = reader
            .read(&mut buf[..want])
            .map_err(|e| LibError::sys("read archive entry", e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        sink.write_all(&buf[..n])
            .map_err(|e| LibError::sys("write staged data", e))?;
        if let Some(ref mut r) = remaining {
            *r -= n as u64;
        }
    }
    let written = hasher.bytes_hashed();
    Ok((written, hasher.finalize()))
}

/// Bitmap helper: all three digest kinds.
pub fn all_hash_kinds() -> u8 {
    HashKind::Crc.bit() | HashKind::Md5.bit() | HashKind::Sha1.bit()
}

#[cfg(test)]
#[path = "../tests/archive_tests.rs"]
mod tests;
