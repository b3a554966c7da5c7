//! Game records: a named catalog unit with ROMs, optional samples, and
//! optional disk images, linked into a parent/clone family.

use crate::checksum::Hashes;
use crate::file::{FileDesc, FileStatus, Where};

/// The two file roles a game carries. Disks live outside the role views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Rom,
    Sample,
}

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Role::Rom => "rom",
            Role::Sample => "sample",
        }
    }

    pub const ALL: [Role; 2] = [Role::Rom, Role::Sample];
}

/// One role view of a game: its parent/grandparent links for that role,
/// the files it lists, and the clones that inherit from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleView {
    pub parent: Option<String>,
    pub grandparent: Option<String>,
    pub clones: Vec<String>,
    pub files: Vec<FileDesc>,
}

impl RoleView {
    /// All files carry `where == InZip`, i.e. the view's own parent link
    /// has not been resolved yet.
    pub fn is_lost(&self) -> bool {
        self.parent.is_some() && self.files.iter().all(|f| f.where_ == Where::InZip)
    }

    pub fn add_clone(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.clones.iter().any(|c| *c == name) {
            self.clones.push(name);
        }
    }
}

/// A disk image attached to a game: name plus recorded digests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameDisk {
    pub name: String,
    pub hashes: Hashes,
    pub status: FileStatus,
}

/// One game from the reference catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Game {
    pub name: String,
    pub description: Option<String>,
    /// Index of the dat file this game came from.
    pub dat_no: u32,
    rom: RoleView,
    sample: RoleView,
    pub disks: Vec<GameDisk>,
}

impl Game {
    pub fn new(name: impl Into<String>) -> Self {
        Game {
            name: name.into(),
            ..Game::default()
        }
    }

    pub fn role(&self, role: Role) -> &RoleView {
        match role {
            Role::Rom => &self.rom,
            Role::Sample => &self.sample,
        }
    }

    pub fn role_mut(&mut self, role: Role) -> &mut RoleView {
        match role {
            Role::Rom => &mut self.rom,
            Role::Sample => &mut self.sample,
        }
    }

    pub fn roms(&self) -> &[FileDesc] {
        &self.rom.files
    }

    pub fn samples(&self) -> &[FileDesc] {
        &self.sample.files
    }

    pub fn has_samples(&self) -> bool {
        !self.sample.files.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/game_tests.rs"]
mod tests;
