//! Zip backend over the `zip` crate.
//!
//! The crate has no in-place mutation, so commit rewrites the archive
//! into a temporary file next to it — transferring unchanged entries and
//! zip-to-zip copies without recompression — and renames it over the
//! original. That makes a zip commit all-or-nothing: on failure the
//! temporary is removed and the pending changes are discarded, matching
//! the discard-session semantics of a failed zip close.

use std::fs;
use std::io::Write;
use std::path::Path;

use rommend_core::checksum::Hashes;
use rommend_core::file::FileDesc;
use rommend_core::util::{ensure_parent_dir, unique_path};

use zip::read::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::error::LibError;

use super::{copy_hashing, Archive, ArchiveEntry, Change, DataSource, EntryState};

fn zip_err(archive: &Path, e: impl std::fmt::Display) -> LibError {
    LibError::zip(archive, e.to_string())
}

fn open_reader(path: &Path) -> Result<ZipArchive<fs::File>, LibError> {
    let file = fs::File::open(path).map_err(LibError::io_at(path))?;
    ZipArchive::new(file).map_err(|e| zip_err(path, e))
}

/// Populate entries from the central directory. Sizes and CRCs come for
/// free; other digests are computed lazily.
pub(super) fn read_entries(archive: &mut Archive) -> Result<(), LibError> {
    let mut zip = open_reader(&archive.name)?;
    for i in 0..zip.len() {
        let entry = zip.by_index_raw(i).map_err(|e| zip_err(&archive.name, e))?;
        if entry.is_dir() {
            continue;
        }
        let mut desc = FileDesc::new(entry.name().to_string());
        desc.size = Some(entry.size());
        desc.hashes.crc = Some(entry.crc32());
        desc.mtime = archive.mtime;
        archive.entries.push(ArchiveEntry {
            desc,
            state: EntryState::InGame,
            broken: false,
        });
    }
    Ok(())
}

/// Recompute every entry's CRC and mark mismatches broken.
pub(super) fn check_integrity(archive: &mut Archive) -> Result<(), LibError> {
    for index in 0..archive.entries.len() {
        let stored = archive.entries[index].desc.hashes.crc;
        match read_range(archive, index, 0, None, &mut std::io::sink()) {
            Ok((_, hashes)) => {
                if stored.is_some() && hashes.crc != stored {
                    archive.entries[index].broken = true;
                }
            }
            Err(_) => {
                archive.entries[index].broken = true;
            }
        }
    }
    Ok(())
}

pub(super) fn read_range(
    archive: &Archive,
    index: usize,
    start: u64,
    length: Option<u64>,
    sink: &mut dyn Write,
) -> Result<(u64, Hashes), LibError> {
    let name = &archive.entries[index].desc.name;
    let mut zip = open_reader(&archive.name)?;
    let mut entry = zip
        .by_name(name)
        .map_err(|e| LibError::zip_file(&archive.name, name.clone(), e.to_string()))?;
    copy_hashing(&mut entry, start, length, sink)
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

pub(super) fn commit(archive: &mut Archive) -> Result<(), LibError> {
    let result = rewrite(archive);
    match result {
        Ok(()) => {
            for index in 0..archive.changes.len() {
                finalize_change(archive, index);
            }
            Ok(())
        }
        Err(e) => {
            // Failed zip session: discard everything pending.
            let _ = discard_changes(archive);
            Err(e)
        }
    }
}

/// Look up an entry for raw (no recompression) transfer.
fn raw_entry<'a>(
    zip: &'a mut ZipArchive<fs::File>,
    archive_name: &Path,
    entry_name: &str,
) -> Result<zip::read::ZipFile<'a>, LibError> {
    let index = zip.index_for_name(entry_name).ok_or_else(|| {
        LibError::zip_file(archive_name, entry_name.to_string(), "no such entry")
    })?;
    zip.by_index_raw(index)
        .map_err(|e| LibError::zip_file(archive_name, entry_name.to_string(), e.to_string()))
}

fn rewrite(archive: &Archive) -> Result<(), LibError> {
    let survivors = archive
        .entries
        .iter()
        .filter(|e| e.state != EntryState::Deleted)
        .count();

    ensure_parent_dir(&archive.name).map_err(LibError::io_at(&archive.name))?;

    // All entries deleted: the archive file itself goes away.
    if survivors == 0 && !archive.flags.keep_empty {
        if archive.name.exists() {
            fs::remove_file(&archive.name).map_err(LibError::io_at(&archive.name))?;
        }
        return Ok(());
    }

    let tmp_path = unique_path(&archive.name.with_extension("zip.tmp"))
        .map_err(LibError::io_at(&archive.name))?;
    let tmp_file = fs::File::create(&tmp_path).map_err(LibError::io_at(&tmp_path))?;
    let mut writer = ZipWriter::new(tmp_file);

    let mut source = if archive.name.exists() {
        Some(open_reader(&archive.name)?)
    } else {
        None
    };

    let write_result = (|| -> Result<(), LibError> {
        for index in 0..archive.entries.len() {
            let entry = &archive.entries[index];
            let change = &archive.changes[index];

            match change {
                Change::Unchanged => {
                    if entry.state == EntryState::InGame {
                        let source = source.as_mut().ok_or_else(|| {
                            zip_err(&archive.name, "archive vanished during commit")
                        })?;
                        let original = raw_entry(source, &archive.name, &entry.desc.name)?;
                        writer
                            .raw_copy_file(original)
                            .map_err(|e| zip_err(&archive.name, e))?;
                    }
                }

                Change::Deleted { .. } => {}

                Change::Renamed { name, .. } => {
                    let source = source.as_mut().ok_or_else(|| {
                        zip_err(&archive.name, "archive vanished during commit")
                    })?;
                    let original = raw_entry(source, &archive.name, &entry.desc.name)?;
                    writer
                        .raw_copy_file_rename(original, name.as_str())
                        .map_err(|e| zip_err(&archive.name, e))?;
                }

                Change::Added { data } => {
                    write_data(&archive.name, &mut writer, &entry.desc.name, data)?;
                }

                Change::Replaced { desc, data, .. } => {
                    write_data(&archive.name, &mut writer, &desc.name, data)?;
                }
            }
        }
        let inner = writer.finish().map_err(|e| zip_err(&archive.name, e))?;
        inner.sync_all().map_err(LibError::io_at(&tmp_path))?;
        Ok(())
    })();

    if let Err(e) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    drop(source);
    fs::rename(&tmp_path, &archive.name).map_err(LibError::io_at(&archive.name))
}

fn write_data(
    archive_name: &Path,
    writer: &mut ZipWriter<fs::File>,
    name: &str,
    data: &DataSource,
) -> Result<(), LibError> {
    match data {
        DataSource::Empty => {
            writer
                .start_file(name, options_for(0))
                .map_err(|e| zip_err(archive_name, e))?;
        }
        DataSource::File(staged) => {
            let size = fs::metadata(staged).map(|m| m.len()).unwrap_or(0);
            writer
                .start_file(name, options_for(size))
                .map_err(|e| zip_err(archive_name, e))?;
            let mut input = fs::File::open(staged).map_err(LibError::io_at(staged))?;
            std::io::copy(&mut input, writer)
                .map_err(|e| LibError::sys(format!("adding {}", name), e))?;
        }
        DataSource::ZipEntry {
            archive: source_path,
            entry,
        } => {
            let mut source = open_reader(source_path)?;
            let original = raw_entry(&mut source, source_path, entry)?;
            writer
                .raw_copy_file_rename(original, name)
                .map_err(|e| zip_err(archive_name, e))?;
        }
    }
    Ok(())
}

fn options_for(size: u64) -> SimpleFileOptions {
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    if size >= u32::MAX as u64 {
        options.large_file(true)
    } else {
        options
    }
}

fn finalize_change(archive: &mut Archive, index: usize) {
    let change = std::mem::take(&mut archive.changes[index]);
    match change {
        Change::Unchanged | Change::Deleted { .. } => {}
        Change::Added { data } => {
            remove_staged(&data);
            archive.entries[index].state = EntryState::InGame;
        }
        Change::Renamed { name, .. } => {
            archive.entries[index].desc.name = name;
        }
        Change::Replaced { desc, data, .. } => {
            remove_staged(&data);
            archive.entries[index].desc = desc;
        }
    }
}

fn remove_staged(data: &DataSource) {
    if let DataSource::File(path) = data {
        let _ = fs::remove_file(path);
    }
}

/// Drop every pending change and staged sidecar; entry states revert to
/// the on-disk truth.
pub(super) fn discard_changes(archive: &mut Archive) -> Result<(), LibError> {
    archive.remove_staged_files();
    for index in 0..archive.changes.len() {
        archive.changes[index] = Change::Unchanged;
        if archive.entries[index].state == EntryState::Deleted {
            archive.entries[index].state = EntryState::InGame;
        }
        // Added entries keep their state and are dropped by compact.
    }
    Ok(())
}
