//! Driving a check across the whole game set.
//!
//! Two traversals: the first checks (and fixes) every selected game,
//! promoting displaced files into the needed pool; the second rechecks
//! games that were left incomplete, now that the pool is richer. The
//! deferred delete lists run once at the end, after every consumer has
//! committed.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use rommend_core::game::Game;

use crate::archive::{Archive, ArchiveKind, BackendKind, OpenFlags};
use crate::context::CheckContext;
use crate::error::LibError;
use crate::fixer::{self, FixOutcome};
use crate::index::Source;
use crate::matcher::{self, GameArchives, GameStatus};
use crate::report;

/// Counters for the run summary.
#[derive(Debug, Default, Clone)]
pub struct SweepStats {
    pub games: usize,
    pub correct: usize,
    pub fixable: usize,
    pub partial: usize,
    pub missing: usize,
    pub old: usize,
    pub fixed: usize,
    pub not_fixed: usize,
    pub superfluous: usize,
    pub stopped: bool,
}

/// Check `games` (or every game in the database when empty) against the
/// ROM directory.
pub fn sweep(ctx: &mut CheckContext, games: &[String]) -> Result<SweepStats, LibError> {
    let all = ctx.db.read_game_list()?;
    if all.is_empty() {
        return Err(LibError::def("list of games not found in database"));
    }

    let full_set = games.is_empty();
    let selected: Vec<String> = if full_set {
        all.clone()
    } else {
        let known: BTreeSet<&String> = all.iter().collect();
        for game in games {
            if !known.contains(game) {
                return Err(LibError::def(format!("game '{}' unknown", game)));
            }
        }
        games.to_vec()
    };

    let mut stats = SweepStats::default();

    // Donor pools: the needed directory from previous runs, then the
    // user-supplied extra trees.
    let needed_dir = ctx.needed_dir();
    scan_donor_dir(ctx, &needed_dir, Source::Needed)?;
    for extra in ctx.config.extra_dirs.clone() {
        scan_donor_dir(ctx, &extra, Source::Extra)?;
    }

    // Pass one.
    let mut recheck: Vec<String> = Vec::new();
    for name in &selected {
        if ctx.stop_requested() {
            stats.stopped = true;
            break;
        }
        let outcome = check_one(ctx, name, &mut stats)?;
        if outcome.needs_recheck {
            recheck.push(name.clone());
        }
    }

    // Superfluous scan of the ROM directory.
    let superfluous = if full_set && !stats.stopped {
        list_superfluous(ctx, &all)?
    } else {
        Vec::new()
    };
    stats.superfluous = superfluous.len();
    report::report_superfluous(&superfluous);
    if ctx.config.fix && full_set {
        ctx.delete_superfluous = superfluous;
    }

    // Pass two: the needed pool may now satisfy what was missing.
    if ctx.config.fix && !stats.stopped {
        for name in &recheck {
            if ctx.stop_requested() {
                stats.stopped = true;
                break;
            }
            check_one(ctx, name, &mut SweepStats::default())?;
        }
    }

    // Deferred deletions, donors first consumed now safe to drop.
    if ctx.config.fix && !stats.stopped {
        let needed_items = std::mem::take(&mut ctx.delete_needed);
        if let Err(e) = fixer::run_delete_list(&needed_items, false) {
            warn!("cleaning needed pool: {}", e);
        }
        let extra_items = std::mem::take(&mut ctx.delete_extra);
        if let Err(e) = fixer::run_delete_list(&extra_items, true) {
            warn!("cleaning extra directories: {}", e);
        }
        let superfluous_items = std::mem::take(&mut ctx.delete_superfluous);
        fixer::run_superfluous_deletes(&superfluous_items);
    }

    ctx.close()?;

    if ctx.config.report_summary {
        info!(
            "games: {}, correct: {}, fixable: {}, partial: {}, missing: {}, old: {}",
            stats.games, stats.correct, stats.fixable, stats.partial, stats.missing, stats.old
        );
        if ctx.config.fix {
            info!("fixed: {}, not fixed: {}", stats.fixed, stats.not_fixed);
        }
    }

    Ok(stats)
}

/// Scan the ROM directory for superfluous containers without checking any
/// game, report them, and (under fix) remove them.
pub fn superfluous_only(ctx: &mut CheckContext) -> Result<Vec<PathBuf>, LibError> {
    let all = ctx.db.read_game_list()?;
    if all.is_empty() {
        return Err(LibError::def("list of games not found in database"));
    }
    let found = list_superfluous(ctx, &all)?;
    report::report_superfluous(&found);
    if ctx.config.fix {
        fixer::run_superfluous_deletes(&found);
    }
    ctx.close()?;
    Ok(found)
}

struct CheckOutcome {
    needs_recheck: bool,
}

/// Check (and fix) one game, updating counters and the fixdat.
fn check_one(
    ctx: &mut CheckContext,
    name: &str,
    stats: &mut SweepStats,
) -> Result<CheckOutcome, LibError> {
    let game = match ctx.db.read_game(name)? {
        Some(game) => game,
        None => {
            return Err(LibError::def(format!(
                "game '{}' in list but not in database",
                name
            )))
        }
    };

    let mut archives = open_game_archives(ctx, &game)?;
    let result = matcher::check_game(ctx, &game, &mut archives)?;

    stats.games += 1;
    match result.status {
        GameStatus::Correct => stats.correct += 1,
        GameStatus::Fixable => stats.fixable += 1,
        GameStatus::Partial => stats.partial += 1,
        GameStatus::Missing => stats.missing += 1,
        GameStatus::Old => stats.old += 1,
    }

    report::report_game(&ctx.config, &game, &result);

    let mut final_result = result;
    if ctx.config.fix {
        match fixer::fix_game(ctx, &game, &final_result, &mut archives)? {
            FixOutcome::Fixed => {
                stats.fixed += 1;
                // Re-derive the post-fix state for the fixdat and the
                // donor index.
                final_result = matcher::check_game(ctx, &game, &mut archives)?;
            }
            FixOutcome::NotFixed => stats.not_fixed += 1,
            FixOutcome::Clean => {}
        }
    }

    if let Some(ref mut fixdat) = ctx.fixdat {
        fixdat.record(name, final_result.missing_files(&game));
    }

    // The game's own archive becomes donor material for later games.
    if let Some(own) = archives.own.take() {
        if !own.is_empty() {
            ctx.index.add_archive(&own, Source::RomSet);
        }
    }

    let needs_recheck = !matches!(final_result.status, GameStatus::Correct | GameStatus::Old);
    Ok(CheckOutcome { needs_recheck })
}

/// Open the game's container and the ancestors that store its inherited
/// files. Ancestors are opened read-only; the game's own container is
/// writable in fix mode.
fn open_game_archives(ctx: &mut CheckContext, game: &Game) -> Result<GameArchives, LibError> {
    let mut archives = GameArchives::none();

    let own_flags = OpenFlags {
        writable: ctx.config.fix,
        create: ctx.config.fix,
        check_integrity: ctx.config.check_integrity,
        skip_file: Some(ctx.caches.file_name().to_string()),
        ..OpenFlags::default()
    };
    archives.own = open_or_none(ctx, &ctx.game_path(&game.name), own_flags)?;

    let ro_flags = OpenFlags {
        check_integrity: ctx.config.check_integrity,
        skip_file: Some(ctx.caches.file_name().to_string()),
        ..OpenFlags::default()
    };
    let rom_view = game.role(rommend_core::game::Role::Rom);
    if let Some(ref parent) = rom_view.parent {
        archives.parent = open_or_none(ctx, &ctx.game_path(parent), ro_flags.clone())?;
    }
    if let Some(ref grandparent) = rom_view.grandparent {
        archives.grandparent = open_or_none(ctx, &ctx.game_path(grandparent), ro_flags)?;
    }

    Ok(archives)
}

fn open_or_none(
    ctx: &CheckContext,
    path: &Path,
    flags: OpenFlags,
) -> Result<Option<Archive>, LibError> {
    if !path.exists() && !flags.create {
        return Ok(None);
    }
    match Archive::open(path, ctx.backend(), ArchiveKind::Rom, flags) {
        Ok(archive) => Ok(Some(archive)),
        Err(e) => {
            warn!("{}", e);
            Ok(None)
        }
    }
}

/// Scan a donor tree (needed pool or extra directory): each zip becomes
/// an archive, and the loose files form one directory archive. Every
/// entry is hashed through the cache and indexed.
fn scan_donor_dir(ctx: &mut CheckContext, dir: &Path, source: Source) -> Result<(), LibError> {
    if !dir.is_dir() {
        return Ok(());
    }

    let mut zips = Vec::new();
    collect_zips(dir, &mut zips)?;
    zips.sort();

    for zip_path in zips {
        if ctx.index.contains_archive(&zip_path) {
            continue;
        }
        let flags = OpenFlags {
            skip_file: Some(ctx.caches.file_name().to_string()),
            ..OpenFlags::default()
        };
        match Archive::open(&zip_path, BackendKind::Zip, ArchiveKind::Rom, flags) {
            Ok(mut archive) => {
                hash_all(ctx, &mut archive, dir)?;
                ctx.index.add_archive(&archive, source);
            }
            Err(e) => warn!("{}", e),
        }
    }

    // Loose files, recursively, as one directory archive. Zips were
    // already indexed as archives of their own.
    let flags = OpenFlags {
        skip_file: Some(ctx.caches.file_name().to_string()),
        skip_zips: true,
        ..OpenFlags::default()
    };
    if !ctx.index.contains_archive(dir) {
        match Archive::open(dir, BackendKind::Dir, ArchiveKind::Rom, flags) {
            Ok(mut archive) => {
                hash_all(ctx, &mut archive, dir)?;
                ctx.index.add_archive(&archive, source);
            }
            Err(e) => warn!("{}", e),
        }
    }

    Ok(())
}

fn collect_zips(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), LibError> {
    let entries = fs::read_dir(dir).map_err(LibError::io_at(dir))?;
    for entry in entries {
        let entry = entry.map_err(LibError::io_at(dir))?;
        let path = entry.path();
        if path.is_dir() {
            collect_zips(&path, out)?;
        } else if path.extension().map(|e| e == "zip").unwrap_or(false) {
            out.push(path);
        }
    }
    Ok(())
}

fn hash_all(ctx: &mut CheckContext, archive: &mut Archive, root: &Path) -> Result<(), LibError> {
    for index in 0..archive.len() {
        archive.ensure_hashes(
            index,
            crate::archive::all_hash_kinds(),
            Some((&mut ctx.caches, root)),
        )?;
    }
    Ok(())
}

/// Containers in the ROM directory that belong to no known game.
fn list_superfluous(ctx: &CheckContext, known: &[String]) -> Result<Vec<PathBuf>, LibError> {
    let rom_dir = &ctx.config.rom_dir;
    if !rom_dir.is_dir() {
        return Ok(Vec::new());
    }
    let known: BTreeSet<&str> = known.iter().map(String::as_str).collect();
    let cache_name = ctx.caches.file_name().to_string();

    let mut found = Vec::new();
    let entries = fs::read_dir(rom_dir).map_err(LibError::io_at(rom_dir))?;
    for entry in entries {
        let entry = entry.map_err(LibError::io_at(rom_dir))?;
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().into_owned();

        if file_name == cache_name
            || file_name == crate::context::NEEDED_DIR
            || file_name == crate::context::UNKNOWN_DIR
        {
            continue;
        }

        if path.is_dir() {
            if ctx.config.roms_zipped {
                // Directories are disk holders; known game names stay.
                if !known.contains(file_name.as_str()) {
                    found.push(path);
                }
            } else if !known.contains(file_name.as_str()) {
                found.push(path);
            }
        } else if ctx.config.roms_zipped {
            match file_name.strip_suffix(".zip") {
                Some(stem) if known.contains(stem) => {}
                _ => found.push(path),
            }
        } else {
            found.push(path);
        }
    }

    found.sort();
    Ok(found)
}

#[cfg(test)]
#[path = "tests/sweep_tests.rs"]
mod tests;
