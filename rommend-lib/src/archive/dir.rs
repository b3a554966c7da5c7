//! Directory backend: one game per directory, one file per entry.
//!
//! Mutations stage through sidecar files inside the archive directory
//! (`name` with separators folded, plus a unique numeric suffix), so the
//! live tree never shows a half-written state. Commit walks the change
//! log in order and stops at the first failure, leaving already-applied
//! changes in place.

use std::fs;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rommend_core::checksum::Hashes;
use rommend_core::file::FileDesc;
use rommend_core::util::{ensure_parent_dir, flatten_name, remove_dir_and_empty_parents, unique_path};

use crate::cache::mtime_of;
use crate::error::LibError;

use super::{copy_hashing, Archive, Change, DataSource, EntryState, StagedOriginal};

/// Populate entries from the directory tree. Subdirectories become
/// entries with `/`-separated names unless the archive is top-level-only.
pub(super) fn read_entries(archive: &mut Archive) -> Result<(), LibError> {
    let root = archive.name.clone();
    let mut paths = Vec::new();
    collect_files(
        &root,
        &root,
        !archive.flags.top_level_only,
        archive.flags.skip_file.as_deref(),
        archive.flags.skip_zips,
        &mut paths,
    )?;
    paths.sort();

    for path in paths {
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(_) => continue,
        };
        let rel = path
            .strip_prefix(&root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");

        let mut desc = FileDesc::new(rel);
        desc.size = Some(meta.len());
        desc.mtime = mtime_of(&path).unwrap_or(0);
        archive.entries.push(super::ArchiveEntry {
            desc,
            state: EntryState::InGame,
            broken: false,
        });
    }
    Ok(())
}

fn collect_files(
    root: &Path,
    dir: &Path,
    recurse: bool,
    skip_file: Option<&str>,
    skip_zips: bool,
    out: &mut Vec<PathBuf>,
) -> Result<(), LibError> {
    let entries = fs::read_dir(dir).map_err(LibError::io_at(dir))?;
    for entry in entries {
        let entry = entry.map_err(LibError::io_at(dir))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(LibError::io_at(&path))?;

        if file_type.is_dir() {
            if recurse {
                collect_files(root, &path, recurse, skip_file, skip_zips, out)?;
            }
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        if skip_zips && path.extension().map(|e| e == "zip").unwrap_or(false) {
            continue;
        }
        if dir == root {
            if let Some(skip) = skip_file {
                if entry.file_name().to_string_lossy() == skip {
                    continue;
                }
            }
        }
        out.push(path);
    }
    Ok(())
}

/// Full on-disk path of the entry's current (pre-commit) name.
fn live_path(archive: &Archive, index: usize) -> PathBuf {
    archive.name.join(&archive.entries[index].desc.name)
}

/// Path holding the entry's original bytes: the moved-aside sidecar when
/// one exists, the live path otherwise.
pub(super) fn original_data_path(archive: &Archive, index: usize) -> PathBuf {
    if let Some(original) = archive.changes.get(index).and_then(|c| c.original()) {
        return original.data_path.clone();
    }
    live_path(archive, index)
}

/// Move the entry's live file into a sidecar so the live name is free.
/// Idempotent: a second call returns the existing staging.
pub(super) fn move_original_aside(
    archive: &mut Archive,
    index: usize,
) -> Result<StagedOriginal, LibError> {
    if let Some(original) = archive.changes[index].original() {
        return Ok(original.clone());
    }

    let live = live_path(archive, index);
    let base = archive.name.join(flatten_name(&archive.entries[index].desc.name));
    let tmp = unique_path(&base).map_err(LibError::io_at(&archive.name))?;
    fs::rename(&live, &tmp).map_err(|e| {
        LibError::zip_file(
            &archive.name,
            archive.entries[index].desc.name.clone(),
            format!("cannot move aside: {}", e),
        )
    })?;

    Ok(StagedOriginal {
        live_path: live,
        data_path: tmp,
    })
}

pub(super) fn read_range(
    archive: &Archive,
    index: usize,
    start: u64,
    length: Option<u64>,
    sink: &mut dyn Write,
) -> Result<(u64, Hashes), LibError> {
    let path = original_data_path(archive, index);
    let mut file = fs::File::open(&path).map_err(LibError::io_at(&path))?;
    file.seek(SeekFrom::Start(start))
        .map_err(LibError::io_at(&path))?;
    copy_hashing(&mut file, 0, length, sink)
}

/// Hardlink `from` to `to`, falling back to a byte copy across devices.
pub(super) fn link_or_copy(from: &Path, to: &Path) -> Result<(), LibError> {
    if fs::hard_link(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| LibError::sys(format!("cannot copy {}", from.display()), e))
}

// ---------------------------------------------------------------------------
// Commit / rollback
// ---------------------------------------------------------------------------

pub(super) fn commit(archive: &mut Archive) -> Result<(), LibError> {
    let all_deleted = archive
        .entries
        .iter()
        .all(|e| e.state == EntryState::Deleted);

    // Applied changes stay applied on failure; the failing and later
    // indexes keep their staged state for the caller to rollback or retry.
    for index in 0..archive.changes.len() {
        if archive.changes[index].is_unchanged() {
            continue;
        }
        apply_change(archive, index)?;
    }

    if all_deleted
        && archive.flags.writable
        && !archive.flags.keep_empty
        && !archive.flags.top_level_only
        && archive.name.exists()
    {
        remove_dir_and_empty_parents(&archive.name).map_err(|e| {
            LibError::zip(&archive.name, format!("cannot remove empty archive: {}", e))
        })?;
    }

    Ok(())
}

/// Materialize one change and clear it. Ordering within the change is
/// destination first, then original disposal, as in the rename-based
/// protocol: each step is a single rename or unlink.
fn apply_change(archive: &mut Archive, index: usize) -> Result<(), LibError> {
    let change = std::mem::take(&mut archive.changes[index]);

    match change {
        Change::Unchanged => {}

        Change::Added { ref data } => {
            let final_path = archive.name.join(&archive.entries[index].desc.name);
            if let Err(e) = place_data(&final_path, data) {
                archive.changes[index] = change;
                return Err(e);
            }
            archive.entries[index].state = EntryState::InGame;
            archive.entries[index].desc.mtime = mtime_of(&final_path).unwrap_or(0);
        }

        Change::Replaced {
            ref desc,
            ref data,
            ref original,
        } => {
            let final_path = archive.name.join(&desc.name);
            if let Err(e) = place_data(&final_path, data) {
                archive.changes[index] = change;
                return Err(e);
            }
            if let Some(original) = original {
                discard_original(&archive.name, original);
            }
            let mtime = mtime_of(&final_path).unwrap_or(0);
            let mut desc = desc.clone();
            desc.mtime = mtime;
            archive.entries[index].desc = desc;
        }

        Change::Renamed {
            ref name,
            ref original,
        } => {
            let final_path = archive.name.join(name);
            let source = match original {
                Some(original) => original.data_path.clone(),
                None => archive.name.join(&archive.entries[index].desc.name),
            };
            if let Err(e) = ensure_parent_dir(&final_path)
                .map_err(LibError::io_at(&final_path))
                .and_then(|_| {
                    fs::rename(&source, &final_path).map_err(LibError::io_at(&final_path))
                })
            {
                archive.changes[index] = change;
                return Err(e);
            }
            if let Some(original) = original {
                prune_parents(&archive.name, &original.live_path);
            }
            archive.entries[index].desc.name = name.clone();
        }

        Change::Deleted { ref original } => {
            if let Some(original) = original {
                if let Err(e) =
                    fs::remove_file(&original.data_path).map_err(LibError::io_at(&original.data_path))
                {
                    archive.changes[index] = change;
                    return Err(e);
                }
                prune_parents(&archive.name, &original.live_path);
            }
        }
    }

    Ok(())
}

fn place_data(final_path: &Path, data: &DataSource) -> Result<(), LibError> {
    ensure_parent_dir(final_path).map_err(LibError::io_at(final_path))?;
    match data {
        DataSource::Empty => {
            fs::File::create(final_path).map_err(LibError::io_at(final_path))?;
        }
        DataSource::File(staged) => {
            fs::rename(staged, final_path).map_err(LibError::io_at(final_path))?;
        }
        DataSource::ZipEntry { .. } => {
            // Zip sources are materialized at staging time for directory
            // destinations.
            return Err(LibError::zip(
                final_path,
                "zip-entry source reached a directory commit",
            ));
        }
    }
    Ok(())
}

/// Dispose of a moved-aside original after its replacement landed, and
/// clean up directories its live path left empty.
fn discard_original(archive_root: &Path, original: &StagedOriginal) {
    if original.data_path != original.live_path {
        let _ = fs::remove_file(&original.data_path);
    }
    prune_parents(archive_root, &original.live_path);
}

/// Remove directories under the archive root left empty by a departed
/// file, from the file's old parent upward, stopping at the root.
fn prune_parents(archive_root: &Path, old_live_path: &Path) {
    let mut current = old_live_path.parent();
    while let Some(dir) = current {
        if dir == archive_root {
            break;
        }
        if fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

pub(super) fn rollback(archive: &mut Archive) -> Result<(), LibError> {
    let mut first_error = None;

    for index in 0..archive.changes.len() {
        let change = std::mem::take(&mut archive.changes[index]);
        match change {
            Change::Unchanged => {}

            Change::Added { data } => {
                if let DataSource::File(staged) = data {
                    let _ = fs::remove_file(staged);
                }
                // State stays Added with a cleared change; compact drops
                // the entry.
            }

            Change::Replaced { data, original, .. } => {
                if let DataSource::File(staged) = data {
                    let _ = fs::remove_file(staged);
                }
                if let Some(original) = original {
                    if let Err(e) = restore_original(&original) {
                        first_error.get_or_insert(e);
                    }
                }
            }

            Change::Renamed { original, .. } => {
                if let Some(original) = original {
                    if let Err(e) = restore_original(&original) {
                        first_error.get_or_insert(e);
                    }
                }
            }

            Change::Deleted { original } => {
                if let Some(original) = original {
                    if let Err(e) = restore_original(&original) {
                        first_error.get_or_insert(e);
                    }
                }
                archive.entries[index].state = EntryState::InGame;
            }
        }
    }

    match first_error {
        None => Ok(()),
        Some(e) => Err(e),
    }
}

fn restore_original(original: &StagedOriginal) -> Result<(), LibError> {
    if original.data_path == original.live_path {
        return Ok(());
    }
    ensure_parent_dir(&original.live_path).map_err(LibError::io_at(&original.live_path))?;
    fs::rename(&original.data_path, &original.live_path)
        .map_err(LibError::io_at(&original.live_path))
}
