//! Building the reference database from a parsed catalog.
//!
//! Games are written as they arrive. Family links are resolved in two
//! passes: immediately where the parent is already usable, otherwise via a
//! lost-children worklist driven to a fixed point after the stream ends.

use std::io::BufRead;

use log::warn;

use rommend_core::game::{Game, Role};
use rommend_core::util::name_cmp;
use rommend_db::{DatEntry, ListKind, RomDb};

use crate::error::DatError;
use crate::listinfo::parse_listinfo;

/// Which role links of a lost child still need resolving.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Todo {
    rom: bool,
    sample: bool,
}

impl Todo {
    fn role(&mut self, role: Role) -> &mut bool {
        match role {
            Role::Rom => &mut self.rom,
            Role::Sample => &mut self.sample,
        }
    }

    fn done(self) -> bool {
        !self.rom && !self.sample
    }
}

/// Counters reported after an ingest run.
#[derive(Debug, Default, Clone)]
pub struct IngestStats {
    pub games: usize,
    pub roms: usize,
    pub samples: usize,
    pub disks: usize,
    /// Children whose parents resolved only after the stream ended.
    pub deferred: usize,
}

/// Ingest one listinfo stream into `db`, assigning `dat_no` to every game.
///
/// The stream's games, name lists, and emulator info end up in the
/// database even when the return value reports dangling parents; callers
/// decide whether partial state is acceptable.
pub fn ingest<R: BufRead>(db: &mut RomDb, input: R, dat_no: u32) -> Result<IngestStats, DatError> {
    let mut stats = IngestStats::default();
    let mut names: Vec<String> = Vec::new();
    let mut lost: Vec<(String, Todo)> = Vec::new();

    let prog = parse_listinfo(input, |mut game| {
        game.dat_no = dat_no;
        stats.games += 1;
        stats.roms += game.roms().len();
        stats.samples += game.samples().len();
        stats.disks += game.disks.len();

        let mut todo = Todo {
            rom: false,
            sample: false,
        };

        for role in Role::ALL {
            // A game claiming itself as parent is a root.
            if game.role(role).parent.as_deref() == Some(game.name.as_str()) {
                game.role_mut(role).parent = None;
            }

            let parent_name = match game.role(role).parent.clone() {
                None => continue,
                Some(name) => name,
            };

            match db.read_game(&parent_name)? {
                Some(mut parent) if !parent.role(role).is_lost() => {
                    family_meeting(db, &mut parent, &mut game, role)?;
                    db.write_game(&parent)?;
                }
                _ => {
                    *todo.role(role) = true;
                }
            }
        }

        db.write_game(&game)?;
        names.push(game.name.clone());

        if !todo.done() {
            lost.push((game.name.clone(), todo));
        }
        Ok(())
    })?;

    let orphans = resolve_lost_children(db, &mut lost, &mut stats)?;

    names.sort_by(|a, b| name_cmp(a, b));
    names.dedup();
    db.write_game_list(&names)?;
    db.write_list(ListKind::Game, &names)?;
    write_member_lists(db, &names)?;
    db.write_prog(&prog)?;

    let mut dats = db.read_dat_entries()?;
    let entry = DatEntry {
        name: prog.name.clone().unwrap_or_default(),
        description: String::new(),
        version: prog.version.clone().unwrap_or_default(),
    };
    if dat_no as usize >= dats.len() {
        dats.resize(dat_no as usize + 1, DatEntry::default());
    }
    dats[dat_no as usize] = entry;
    db.write_dat_entries(&dats)?;

    if !orphans.is_empty() {
        return Err(DatError::DanglingParent { orphans });
    }
    Ok(stats)
}

/// Iterate the lost-children worklist until a pass resolves nothing.
/// Returns the names of children left dangling.
fn resolve_lost_children(
    db: &mut RomDb,
    lost: &mut Vec<(String, Todo)>,
    stats: &mut IngestStats,
) -> Result<Vec<String>, DatError> {
    let mut progressed = !lost.is_empty();
    while progressed {
        progressed = false;

        for entry in lost.iter_mut() {
            let (name, todo) = entry;
            if todo.done() {
                continue;
            }

            let mut child = db.read_game(name)?.ok_or_else(|| {
                DatError::Inconsistent(format!("lost child {} not in database", name))
            })?;

            for role in Role::ALL {
                if !*todo.role(role) {
                    continue;
                }
                let parent_name = match child.role(role).parent.clone() {
                    // Parent link vanished; nothing left to resolve.
                    None => {
                        *todo.role(role) = false;
                        progressed = true;
                        continue;
                    }
                    Some(n) => n,
                };

                let mut parent = match db.read_game(&parent_name)? {
                    None => continue,
                    Some(p) => p,
                };
                if parent.role(role).is_lost() {
                    continue;
                }

                family_meeting(db, &mut parent, &mut child, role)?;
                db.write_game(&parent)?;
                db.write_game(&child)?;
                *todo.role(role) = false;
                stats.deferred += 1;
                progressed = true;
            }
        }
    }

    let mut orphans = Vec::new();
    for (name, todo) in lost.iter() {
        if todo.done() {
            continue;
        }
        if let Some(child) = db.read_game(name)? {
            let mut todo = *todo;
            for role in Role::ALL {
                if *todo.role(role) {
                    let parent = child.role(role).parent.clone().unwrap_or_default();
                    warn!("{} parent {} of {} not resolvable", role.name(), parent, name);
                }
            }
        }
        orphans.push(name.clone());
    }
    orphans.sort_by(|a, b| name_cmp(a, b));
    Ok(orphans)
}

/// Introduce a resolved parent to its child for one role: update clone
/// lists up the chain, propagate the grandparent link, and push the
/// child's inherited files one step up the `where` ladder.
///
/// The caller persists `parent` and `child`; the grandparent (when any)
/// is rewritten here.
fn family_meeting(
    db: &mut RomDb,
    parent: &mut Game,
    child: &mut Game,
    role: Role,
) -> Result<(), DatError> {
    if let Some(grandparent_name) = parent.role(role).parent.clone() {
        if let Some(mut grandparent) = db.read_game(&grandparent_name)? {
            grandparent.role_mut(role).add_clone(child.name.clone());
            db.write_game(&grandparent)?;
        }
        child.role_mut(role).grandparent = Some(grandparent_name);
    }

    parent.role_mut(role).add_clone(child.name.clone());

    let parent_files = parent.role(role).files.clone();
    for file in &mut child.role_mut(role).files {
        if let Some(matching) = parent_files.iter().find(|pf| file.is_mergable(pf)) {
            file.where_ = matching.where_.deeper();
        }
    }

    Ok(())
}

/// Write the disk and sample member lists derived from the game records.
fn write_member_lists(db: &mut RomDb, names: &[String]) -> Result<(), DatError> {
    let mut disks: Vec<String> = Vec::new();
    let mut samples: Vec<String> = Vec::new();

    for name in names {
        if let Some(game) = db.read_game(name)? {
            for disk in &game.disks {
                disks.push(disk.name.clone());
            }
            if game.has_samples() {
                samples.push(game.name.clone());
            }
        }
    }

    disks.sort_by(|a, b| name_cmp(a, b));
    disks.dedup();
    samples.sort_by(|a, b| name_cmp(a, b));

    db.write_list(ListKind::Disk, &disks)?;
    db.write_list(ListKind::Sample, &samples)?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/ingest_tests.rs"]
mod tests;
