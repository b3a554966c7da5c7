//! Per-game classification of expected files against open archives.
//!
//! For every ROM a game lists, decide whether the set holds it, holds it
//! under the wrong name, holds a longer file containing it, can obtain it
//! from somewhere else, or lacks it — then aggregate into a game verdict.

use std::path::Path;

use rommend_core::checksum::HashCompare;
use rommend_core::file::{FileDesc, FileStatus, Where};
use rommend_core::game::Game;

use crate::archive::{all_hash_kinds, Archive, EntryState};
use crate::chd;
use crate::context::CheckContext;
use crate::error::LibError;
use crate::index::{FileLocation, Source};

/// Verdict for one expected file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileQuality {
    /// Nothing with this content anywhere.
    Missing,
    /// A candidate exists but shares no checksum algorithm.
    NoHash,
    /// A candidate exists with conflicting checksums.
    HashErr,
    /// The entry at `index` starts with the expected bytes but is longer.
    Long { index: usize },
    /// The entry at `index` has the right content under the wrong name.
    NameErr { index: usize },
    /// A byte-identical donor exists elsewhere.
    Copied { location: FileLocation },
    /// Stored in this game's container although it belongs up the chain.
    InZip { index: usize },
    Ok,
    /// Content exists in the old database.
    Old { game: Option<String> },
    /// The catalog has no good dump; nothing can be verified.
    NoDump,
}

impl FileQuality {
    pub fn is_fixable(&self) -> bool {
        matches!(
            self,
            FileQuality::Long { .. }
                | FileQuality::NameErr { .. }
                | FileQuality::Copied { .. }
                | FileQuality::InZip { .. }
        )
    }
}

/// How an archive entry relates to the game being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    /// Content the catalog knows nothing about.
    Unknown,
    /// Satisfies one of this game's files.
    Used,
    /// A prefix of it satisfies one of this game's files.
    PartUsed,
    /// Another game wants this content.
    Needed,
    /// Also present in the old database; the set copy is redundant.
    Duplicate,
    /// Failed the integrity check.
    Broken,
}

/// Verdict for one expected disk image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskQuality {
    Ok,
    Missing,
    HashErr,
    NoHash,
    NoDump,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskMatch {
    pub name: String,
    pub quality: DiskQuality,
}

/// Aggregate game verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Missing,
    Correct,
    Fixable,
    Partial,
    Old,
}

/// Everything the matcher learned about one game.
#[derive(Debug)]
pub struct GameResult {
    pub game: String,
    pub status: GameStatus,
    /// Parallel to the game's ROM list.
    pub files: Vec<FileQuality>,
    /// Parallel to the game's own archive entries; empty without one.
    pub usage: Vec<Usage>,
    /// Names of the archive entries `usage` refers to.
    pub entry_names: Vec<String>,
    pub disks: Vec<DiskMatch>,
}

impl GameResult {
    /// ROMs still missing from the set (for the fixdat).
    pub fn missing_files(&self, game: &Game) -> Vec<FileDesc> {
        game.roms()
            .iter()
            .zip(&self.files)
            .filter(|(f, q)| {
                f.where_ == Where::InZip
                    && matches!(
                        q,
                        FileQuality::Missing | FileQuality::NoHash | FileQuality::HashErr
                    )
            })
            .map(|(f, _)| f.clone())
            .collect()
    }
}

/// The open containers for one game: its own archive plus ancestors for
/// inherited files.
pub struct GameArchives {
    pub own: Option<Archive>,
    pub parent: Option<Archive>,
    pub grandparent: Option<Archive>,
}

impl GameArchives {
    pub fn none() -> GameArchives {
        GameArchives {
            own: None,
            parent: None,
            grandparent: None,
        }
    }

    fn for_where(&mut self, w: Where) -> Option<&mut Archive> {
        match w {
            Where::InZip => self.own.as_mut(),
            Where::InParent => self.parent.as_mut(),
            Where::InGrandparent => self.grandparent.as_mut(),
            _ => None,
        }
    }
}

/// Classify every expected file of `game` and derive the game verdict.
pub fn check_game(
    ctx: &mut CheckContext,
    game: &Game,
    archives: &mut GameArchives,
) -> Result<GameResult, LibError> {
    let mut files = Vec::with_capacity(game.roms().len());

    for expected in game.roms() {
        let quality = classify_file(ctx, expected, archives)?;
        files.push(quality);
    }

    let usage = classify_usage(ctx, game, &files, archives)?;
    let entry_names = archives
        .own
        .as_ref()
        .map(|a| a.entries().iter().map(|e| e.desc.name.clone()).collect())
        .unwrap_or_default();
    let disks = check_disks(ctx, game)?;
    let status = aggregate(game, &files, &disks);

    Ok(GameResult {
        game: game.name.clone(),
        status,
        files,
        usage,
        entry_names,
        disks,
    })
}

fn classify_file(
    ctx: &mut CheckContext,
    expected: &FileDesc,
    archives: &mut GameArchives,
) -> Result<FileQuality, LibError> {
    if expected.status == FileStatus::NoDump {
        return Ok(FileQuality::NoDump);
    }

    let cache_root = ctx.config.rom_dir.clone();

    // Inherited files are verified against the ancestor that stores them;
    // a stray copy in the game's own container is only noted.
    if expected.where_ != Where::InZip {
        if let Some(target) = archives.for_where(expected.where_) {
            if let Some(index) = find_candidate(target, expected) {
                let verdict =
                    compare_candidate(ctx, target, index, expected, &cache_root)?;
                if verdict == CandidateVerdict::Ok {
                    return Ok(FileQuality::Ok);
                }
            }
        }
        if let Some(own) = archives.own.as_mut() {
            if let Some(index) = find_candidate(own, expected) {
                if compare_candidate(ctx, own, index, expected, &cache_root)?
                    == CandidateVerdict::Ok
                {
                    return Ok(FileQuality::InZip { index });
                }
            }
        }
        return Ok(FileQuality::Missing);
    }

    let own = match archives.own.as_mut() {
        Some(own) => own,
        None => return Ok(fallback_quality(ctx, expected)),
    };

    // Pass 1: candidate by name.
    let mut candidate_verdict = None;
    if let Some(index) = find_candidate(own, expected) {
        let verdict = compare_candidate(ctx, own, index, expected, &cache_root)?;
        match verdict {
            CandidateVerdict::Ok => return Ok(FileQuality::Ok),
            CandidateVerdict::Long => return Ok(FileQuality::Long { index }),
            other => candidate_verdict = Some(other),
        }
    }

    // Pass 2: same content under another name.
    for index in 0..own.len() {
        let entry = own.entry(index);
        if entry.state == EntryState::Deleted || entry.broken {
            continue;
        }
        if expected.answers_to(&entry.desc.name) {
            continue;
        }
        if expected.size.is_some() && expected.size != entry.desc.size {
            continue;
        }
        own.ensure_hashes(
            index,
            expected.hashes.kinds(),
            Some((&mut ctx.caches, &cache_root)),
        )?;
        let entry = own.entry(index);
        if !entry.broken
            && expected.hashes.compare(&entry.desc.hashes) == HashCompare::Match
        {
            return Ok(FileQuality::NameErr { index });
        }
    }

    // Pass 3: donors elsewhere, then the old database.
    let elsewhere = fallback_quality(ctx, expected);
    match elsewhere {
        FileQuality::Missing => Ok(match candidate_verdict {
            Some(CandidateVerdict::NoHash) => FileQuality::NoHash,
            Some(CandidateVerdict::HashErr) => FileQuality::HashErr,
            _ => FileQuality::Missing,
        }),
        other => Ok(other),
    }
}

/// Donor lookup across set, needed pool, extra directories, and the old
/// database, in that order of preference.
fn fallback_quality(ctx: &CheckContext, expected: &FileDesc) -> FileQuality {
    if expected.hashes.is_empty() {
        return FileQuality::Missing;
    }
    for source in [Source::RomSet, Source::Needed, Source::Extra] {
        if let Some(location) = ctx.index.find_in(source, expected.size, &expected.hashes) {
            return FileQuality::Copied {
                location: location.clone(),
            };
        }
    }
    if let Some(location) = ctx.index.find_in(Source::Old, expected.size, &expected.hashes) {
        return FileQuality::Old {
            game: location.game.clone(),
        };
    }
    FileQuality::Missing
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateVerdict {
    Ok,
    Long,
    HashErr,
    NoHash,
}

/// Index of the entry answering to the expected file's name.
fn find_candidate(archive: &Archive, expected: &FileDesc) -> Option<usize> {
    archive.entries().iter().position(|e| {
        e.state != EntryState::Deleted && expected.answers_to(&e.desc.name)
    })
}

/// Compare one archive entry against the expected file, including the
/// long-file prefix probe and the header-detector fallback.
fn compare_candidate(
    ctx: &mut CheckContext,
    archive: &mut Archive,
    index: usize,
    expected: &FileDesc,
    cache_root: &Path,
) -> Result<CandidateVerdict, LibError> {
    archive.ensure_hashes(
        index,
        expected.hashes.kinds(),
        Some((&mut ctx.caches, cache_root)),
    )?;
    let entry = archive.entry(index);
    if entry.broken {
        return Ok(CandidateVerdict::HashErr);
    }

    let entry_size = entry.desc.size;
    let same_size = expected.size.is_none() || expected.size == entry_size;

    if same_size {
        match expected.hashes.compare(&entry.desc.hashes) {
            HashCompare::Match => return Ok(CandidateVerdict::Ok),
            HashCompare::NoCommon => return Ok(CandidateVerdict::NoHash),
            HashCompare::Mismatch => {}
        }
        // Header detector: same visible size, content matches once the
        // header is stripped.
        if let Some(detector) = ctx.detector.clone() {
            if detector.skip > 0 {
                if let (Some(want), Some(have)) = (expected.size, entry_size) {
                    if have == want + detector.skip {
                        let (_, stripped) =
                            archive.hash_region(index, detector.skip, Some(want))?;
                        if expected.hashes.compare(&stripped) == HashCompare::Match {
                            return Ok(CandidateVerdict::Ok);
                        }
                    }
                }
            }
        }
        return Ok(CandidateVerdict::HashErr);
    }

    // Long file: expected size known, entry strictly larger, and the
    // prefix hashes to the expected digests.
    if let (Some(want), Some(have)) = (expected.size, entry_size) {
        if have > want {
            let (hashed, prefix) = archive.hash_region(index, 0, Some(want))?;
            if hashed == want && expected.hashes.compare(&prefix) == HashCompare::Match {
                return Ok(CandidateVerdict::Long);
            }
            // Detector header at the front of a long file.
            if let Some(detector) = ctx.detector.clone() {
                if detector.skip > 0 && have == want + detector.skip {
                    let (_, stripped) = archive.hash_region(index, detector.skip, Some(want))?;
                    if expected.hashes.compare(&stripped) == HashCompare::Match {
                        return Ok(CandidateVerdict::Ok);
                    }
                }
            }
        }
    }
    Ok(CandidateVerdict::HashErr)
}

/// Decide what every entry of the game's own archive is for.
fn classify_usage(
    ctx: &mut CheckContext,
    game: &Game,
    files: &[FileQuality],
    archives: &mut GameArchives,
) -> Result<Vec<Usage>, LibError> {
    let own = match archives.own.as_mut() {
        Some(own) => own,
        None => return Ok(Vec::new()),
    };
    let cache_root = ctx.config.rom_dir.clone();

    let mut usage = vec![Usage::Unknown; own.len()];
    for (i, entry) in own.entries().iter().enumerate() {
        if entry.broken {
            usage[i] = Usage::Broken;
        }
    }

    // Entries consumed by this game's own files.
    for (expected, quality) in game.roms().iter().zip(files) {
        match quality {
            FileQuality::Ok => {
                if expected.where_ == Where::InZip {
                    if let Some(index) = find_candidate(own, expected) {
                        usage[index] = Usage::Used;
                    }
                }
            }
            FileQuality::NameErr { index } => usage[*index] = Usage::Used,
            FileQuality::Long { index } => usage[*index] = Usage::PartUsed,
            FileQuality::InZip { index } => usage[*index] = Usage::Needed,
            _ => {}
        }
    }

    // Remaining entries: old duplicates, donors for other games, or junk.
    for index in 0..own.len() {
        if own.entry(index).state == EntryState::Deleted {
            continue;
        }
        if usage[index] != Usage::Unknown && usage[index] != Usage::Used {
            continue;
        }
        own.ensure_hashes(index, all_hash_kinds(), Some((&mut ctx.caches, &cache_root)))?;
        let entry = own.entry(index);
        if entry.broken {
            usage[index] = Usage::Broken;
            continue;
        }

        if !ctx.config.keep_old_duplicate && ctx.in_old_db(entry.desc.size, &entry.desc.hashes)
        {
            usage[index] = Usage::Duplicate;
            continue;
        }
        if usage[index] == Usage::Used {
            continue;
        }
        if ctx.catalog.is_wanted(&entry.desc.hashes) {
            usage[index] = Usage::Needed;
        }
    }

    Ok(usage)
}

fn check_disks(ctx: &mut CheckContext, game: &Game) -> Result<Vec<DiskMatch>, LibError> {
    let mut out = Vec::with_capacity(game.disks.len());

    for disk in &game.disks {
        if disk.status == FileStatus::NoDump {
            out.push(DiskMatch {
                name: disk.name.clone(),
                quality: DiskQuality::NoDump,
            });
            continue;
        }

        let path = ctx
            .config
            .rom_dir
            .join(&game.name)
            .join(format!("{}.chd", disk.name));
        if !path.exists() {
            out.push(DiskMatch {
                name: disk.name.clone(),
                quality: DiskQuality::Missing,
            });
            continue;
        }

        let info = chd::read_disk_info(&path)?;
        let quality = match disk.hashes.compare(&info.hashes) {
            HashCompare::Match => DiskQuality::Ok,
            HashCompare::Mismatch => DiskQuality::HashErr,
            HashCompare::NoCommon => DiskQuality::NoHash,
        };
        out.push(DiskMatch {
            name: disk.name.clone(),
            quality,
        });
    }

    Ok(out)
}

/// Roll per-file verdicts up into the game verdict.
fn aggregate(game: &Game, files: &[FileQuality], disks: &[DiskMatch]) -> GameStatus {
    let mut total = 0usize;
    let mut correct = 0usize;
    let mut fixable = 0usize;
    let mut old = 0usize;

    for (expected, quality) in game.roms().iter().zip(files) {
        if expected.where_ != Where::InZip {
            // Inherited files are the ancestor's to store and report.
            continue;
        }
        match quality {
            FileQuality::NoDump => {}
            FileQuality::Ok => {
                total += 1;
                correct += 1;
            }
            FileQuality::Old { .. } => {
                total += 1;
                old += 1;
            }
            q if q.is_fixable() => {
                total += 1;
                fixable += 1;
            }
            _ => {
                total += 1;
            }
        }
    }

    for disk in disks {
        match disk.quality {
            DiskQuality::NoDump => {}
            DiskQuality::Ok => {
                total += 1;
                correct += 1;
            }
            _ => {
                total += 1;
            }
        }
    }

    let found = correct + fixable + old;
    if total == 0 || correct == total {
        GameStatus::Correct
    } else if old == total {
        GameStatus::Old
    } else if found == total {
        GameStatus::Fixable
    } else if found > 0 {
        GameStatus::Partial
    } else {
        GameStatus::Missing
    }
}

#[cfg(test)]
#[path = "tests/matcher_tests.rs"]
mod tests;
