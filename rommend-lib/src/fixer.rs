//! Turning a game's match result into archive mutations.
//!
//! Staging order matters: quarantine/needed/duplicate cleanup first (it
//! frees entry names), then renames, subsection extracts, and donor
//! copies. Sidecar archives commit before the game's own archive, so
//! displaced bytes are safe before their originals disappear; donors are
//! only queued for deletion once the consuming commit has succeeded, and
//! the queues run after the whole traversal.

use std::path::{Path, PathBuf};

use log::{info, warn};

use rommend_core::checksum::HashCompare;
use rommend_core::file::{FileDesc, Where};
use rommend_core::game::Game;

use crate::archive::{Archive, ArchiveKind, BackendKind, EntryState, OpenFlags};
use crate::context::{CheckContext, DeleteItem};
use crate::error::LibError;
use crate::index::Source;
use crate::matcher::{FileQuality, GameArchives, GameResult, GameStatus, Usage};

/// What happened to the game's archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    /// Nothing needed doing.
    Clean,
    /// Mutations committed.
    Fixed,
    /// A mutation or commit failed; the archive was rolled back.
    NotFixed,
}

/// Apply every planned fix for one game. Errors inside the archive are
/// reported and mapped to `NotFixed` so the sweep can continue.
pub fn fix_game(
    ctx: &mut CheckContext,
    game: &Game,
    result: &GameResult,
    archives: &mut GameArchives,
) -> Result<FixOutcome, LibError> {
    if !ctx.config.fix {
        return Ok(FixOutcome::Clean);
    }

    // Completeness gate: never start pulling files into a game that would
    // still be incomplete afterwards.
    if ctx.config.complete_only
        && matches!(result.status, GameStatus::Missing | GameStatus::Partial)
    {
        return Ok(FixOutcome::Clean);
    }

    let own = match archives.own.as_mut() {
        Some(own) => own,
        None => return Ok(FixOutcome::Clean),
    };

    match stage_fixes(ctx, game, result, own) {
        Ok(staged) if !staged.any => Ok(FixOutcome::Clean),
        Ok(staged) => match commit_fixes(ctx, own, staged) {
            Ok(()) => Ok(FixOutcome::Fixed),
            Err(e) => {
                warn!("{}: fix failed: {}", game.name, e);
                let _ = own.rollback();
                Ok(FixOutcome::NotFixed)
            }
        },
        Err(e) => {
            warn!("{}: fix failed: {}", game.name, e);
            let _ = own.rollback();
            Ok(FixOutcome::NotFixed)
        }
    }
}

/// Sidecar archives and donor bookkeeping produced while staging.
struct StagedFixes {
    any: bool,
    garbage: Option<Archive>,
    needed: Option<Archive>,
    /// Donor deletions to queue once the own archive commit succeeds.
    donors_used: Vec<DeleteItem>,
}

fn stage_fixes(
    ctx: &mut CheckContext,
    game: &Game,
    result: &GameResult,
    own: &mut Archive,
) -> Result<StagedFixes, LibError> {
    let mut staged = StagedFixes {
        any: false,
        garbage: None,
        needed: None,
        donors_used: Vec::new(),
    };
    let verbose = ctx.config.verbose;

    // Cleanup first: it frees names the renames and copies below need.
    for (index, usage) in result.usage.iter().enumerate() {
        if index >= own.len() || own.entry(index).state == EntryState::Deleted {
            continue;
        }
        match usage {
            Usage::Unknown => {
                if !ctx.config.move_unknown {
                    continue;
                }
                if verbose {
                    info!(
                        "{}: move unknown file {} to quarantine",
                        game.name,
                        own.entry(index).desc.name
                    );
                }
                copy_to_sidecar(ctx, &mut staged.garbage, SidecarKind::Garbage, game, own, index)?;
                own.file_delete(index)?;
                staged.any = true;
            }
            Usage::Needed => {
                if verbose {
                    info!(
                        "{}: move {} to needed pool",
                        game.name,
                        own.entry(index).desc.name
                    );
                }
                copy_to_sidecar(ctx, &mut staged.needed, SidecarKind::Needed, game, own, index)?;
                own.file_delete(index)?;
                staged.any = true;
            }
            Usage::Duplicate => {
                if verbose {
                    info!(
                        "{}: delete {} (present in old database)",
                        game.name,
                        own.entry(index).desc.name
                    );
                }
                own.file_delete(index)?;
                staged.any = true;
            }
            _ => {}
        }
    }

    // Expected-file fixes: renames, extracts, copies.
    for (expected, quality) in game.roms().iter().zip(&result.files) {
        if expected.where_ != Where::InZip {
            continue;
        }
        match quality {
            FileQuality::NameErr { index } => {
                if own.entry(*index).state == EntryState::Deleted {
                    continue;
                }
                if verbose {
                    info!(
                        "{}: rename {} to {}",
                        game.name,
                        own.entry(*index).desc.name,
                        expected.name
                    );
                }
                own.file_rename(*index, &expected.name)?;
                staged.any = true;
            }

            FileQuality::Long { index } => {
                if !ctx.config.move_long || own.entry(*index).state == EntryState::Deleted {
                    continue;
                }
                let size = match expected.size {
                    Some(size) => size,
                    None => continue,
                };
                if verbose {
                    info!(
                        "{}: extract {} bytes of {} as {}",
                        game.name,
                        size,
                        own.entry(*index).desc.name,
                        expected.name
                    );
                }
                // Quarantine the oversized original before shrinking it.
                copy_to_sidecar(ctx, &mut staged.garbage, SidecarKind::Garbage, game, own, *index)?;
                own.file_extract_range(*index, &expected.name, 0, size)?;
                staged.any = true;
            }

            FileQuality::Copied { location } => {
                let archive_path = match &location.archive {
                    Some(path) => path.clone(),
                    None => continue,
                };
                if verbose {
                    info!(
                        "{}: copy {} from {}",
                        game.name,
                        expected.name,
                        archive_path.display()
                    );
                }

                if archive_path == own.name() {
                    own.file_copy_within(location.index, &expected.name)?;
                } else {
                    let backend = backend_of(&archive_path);
                    let mut donor = Archive::open(
                        &archive_path,
                        backend,
                        ArchiveKind::Rom,
                        OpenFlags::default(),
                    )?;
                    let donor_index = match locate_donor_entry(
                        ctx,
                        &mut donor,
                        location.index,
                        expected,
                    )? {
                        Some(i) => i,
                        None => {
                            warn!(
                                "{}: donor for {} vanished from {}",
                                game.name,
                                expected.name,
                                archive_path.display()
                            );
                            continue;
                        }
                    };
                    own.file_copy_from(&donor, donor_index, &expected.name, 0, None)?;

                    let entry_name = donor.entry(donor_index).desc.name.clone();
                    let queue_delete = match location.source {
                        Source::Needed => true,
                        Source::Extra => ctx.config.move_from_extra,
                        _ => false,
                    };
                    if queue_delete {
                        staged.donors_used.push(DeleteItem {
                            archive: archive_path,
                            backend,
                            entry: entry_name,
                        });
                    }
                }
                staged.any = true;
            }

            _ => {}
        }
    }

    Ok(staged)
}

/// Re-find the donor entry in a freshly opened archive: the recorded
/// index is preferred, but earlier fixes may have shifted or renamed
/// entries, so content is verified before use.
fn locate_donor_entry(
    ctx: &mut CheckContext,
    donor: &mut Archive,
    recorded_index: usize,
    expected: &FileDesc,
) -> Result<Option<usize>, LibError> {
    let donor_root = ctx.cache_root_for(donor.name());
    let candidates: Vec<usize> = std::iter::once(recorded_index)
        .chain(0..donor.len())
        .filter(|&i| i < donor.len())
        .collect();

    for i in candidates {
        if donor.entry(i).state == EntryState::Deleted {
            continue;
        }
        if expected.size.is_some() && donor.entry(i).desc.size != expected.size {
            continue;
        }
        donor.ensure_hashes(
            i,
            expected.hashes.kinds(),
            Some((&mut ctx.caches, &donor_root)),
        )?;
        let entry = donor.entry(i);
        if !entry.broken && expected.hashes.compare(&entry.desc.hashes) == HashCompare::Match {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

#[derive(Clone, Copy)]
enum SidecarKind {
    Garbage,
    Needed,
}

/// Copy an entry into the game's quarantine or needed-pool sidecar,
/// opening it lazily on first use.
fn copy_to_sidecar(
    ctx: &CheckContext,
    sidecar: &mut Option<Archive>,
    kind: SidecarKind,
    game: &Game,
    own: &Archive,
    index: usize,
) -> Result<(), LibError> {
    if sidecar.is_none() {
        let path = match kind {
            SidecarKind::Garbage => ctx.unknown_path(&game.name),
            SidecarKind::Needed => ctx.needed_path(&game.name),
        };
        let flags = OpenFlags {
            writable: true,
            create: true,
            keep_empty: true,
            ..OpenFlags::default()
        };
        *sidecar = Some(Archive::open(&path, ctx.backend(), ArchiveKind::Rom, flags)?);
    }
    let sidecar = sidecar
        .as_mut()
        .ok_or_else(|| LibError::def("sidecar archive failed to open"))?;

    // Keep the entry's name, making it unique if a previous quarantine
    // already used it.
    let base = own.entry(index).desc.name.clone();
    let mut name = base.clone();
    let mut n = 0;
    while sidecar.will_exist_after_commit(&name) {
        name = format!("{}.{}", base, n);
        n += 1;
    }

    sidecar.file_copy_from(own, index, &name, 0, None)?;
    Ok(())
}

/// Commit order: sidecars first, then the game archive, then donor
/// bookkeeping.
fn commit_fixes(
    ctx: &mut CheckContext,
    own: &mut Archive,
    mut staged: StagedFixes,
) -> Result<(), LibError> {
    if let Some(ref mut garbage) = staged.garbage {
        garbage.commit()?;
    }
    if let Some(ref mut needed) = staged.needed {
        needed.commit()?;
    }

    own.commit()?;

    let needed_dir = ctx.needed_dir();
    for item in staged.donors_used.drain(..) {
        if item.archive.starts_with(&needed_dir) {
            ctx.delete_needed.push(item);
        } else {
            ctx.delete_extra.push(item);
        }
    }

    // Newly stocked needed archives become donors for the recheck pass.
    if let Some(needed) = staged.needed {
        ctx.index.add_archive(&needed, Source::Needed);
    }

    Ok(())
}

fn backend_of(path: &Path) -> BackendKind {
    if path.extension().map(|e| e == "zip").unwrap_or(false) {
        BackendKind::Zip
    } else {
        BackendKind::Dir
    }
}

/// Execute the deferred donor deletions collected during the traversal.
///
/// `keep_container` leaves an emptied container in place; used for extra
/// directories, which belong to the user even when fully consumed.
pub fn run_delete_list(items: &[DeleteItem], keep_container: bool) -> Result<usize, LibError> {
    use std::collections::BTreeMap;

    let mut by_archive: BTreeMap<PathBuf, Vec<&DeleteItem>> = BTreeMap::new();
    for item in items {
        by_archive.entry(item.archive.clone()).or_default().push(item);
    }

    let mut deleted = 0;
    for (path, items) in by_archive {
        if !path.exists() {
            continue;
        }
        let flags = OpenFlags {
            writable: true,
            keep_empty: keep_container,
            ..OpenFlags::default()
        };
        let mut archive = Archive::open(&path, items[0].backend, ArchiveKind::Rom, flags)?;
        for item in &items {
            if let Some(index) = archive.find_entry(&item.entry) {
                archive.file_delete(index)?;
                deleted += 1;
            }
        }
        archive.commit()?;
    }
    Ok(deleted)
}

/// Remove superfluous containers queued during the sweep.
pub fn run_superfluous_deletes(paths: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in paths {
        let ok = if path.is_dir() {
            std::fs::remove_dir_all(path).is_ok()
        } else {
            std::fs::remove_file(path).is_ok()
        };
        if ok {
            removed += 1;
        } else {
            warn!("cannot remove superfluous {}", path.display());
        }
    }
    removed
}

#[cfg(test)]
#[path = "tests/fixer_tests.rs"]
mod tests;
