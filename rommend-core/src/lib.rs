//! Core data model for rommend: hash sets, file descriptors, and game
//! records as they appear in the reference database.

pub mod checksum;
pub mod file;
pub mod game;
pub mod util;

pub use checksum::{HashCompare, HashKind, Hasher, Hashes};
pub use file::{FileDesc, FileStatus, Where};
pub use game::{Game, GameDisk, Role, RoleView};
