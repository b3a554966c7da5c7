//! The explicit state threaded through a check run.
//!
//! Everything the sweep, matcher, and fixer share lives here: the open
//! databases, the configuration record, the donor index, the directory
//! cache registry, the deferred delete lists, and the cooperative stop
//! flag. Nothing in the engine is a process-wide singleton.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rommend_core::checksum::Hashes;
use rommend_core::game::Role;
use rommend_db::{Detector, RomDb};

use crate::archive::BackendKind;
use crate::cache::CacheRegistry;
use crate::error::LibError;
use crate::fixdat::Fixdat;
use crate::index::{CatalogIndex, FileIndex, Source};

/// Subdirectory of the ROM directory collecting files needed elsewhere.
pub const NEEDED_DIR: &str = ".needed";
/// Subdirectory of the ROM directory quarantining unknown files.
pub const UNKNOWN_DIR: &str = ".unknown";

/// The configuration record handed to the engine by the CLI wrapper.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub rom_dir: PathBuf,
    pub extra_dirs: Vec<PathBuf>,
    /// Games are zip files (default) rather than directories.
    pub roms_zipped: bool,
    pub fix: bool,
    /// Print every fix as it is made.
    pub verbose: bool,
    /// Only apply fixes that leave the game complete.
    pub complete_only: bool,
    /// Keep set copies of files that also exist in the old database.
    pub keep_old_duplicate: bool,
    /// Delete files from extra directories once they have been copied in.
    pub move_from_extra: bool,
    /// Verify stored CRCs of all archives on open.
    pub check_integrity: bool,
    /// Extract the valid prefix of long files and quarantine the rest.
    pub move_long: bool,
    /// Quarantine unknown files instead of leaving them in place.
    pub move_unknown: bool,
    pub report_correct: bool,
    pub report_detailed: bool,
    pub report_fixable: bool,
    pub report_missing: bool,
    pub report_summary: bool,
    /// Cache file name used in registered directories.
    pub cache_file_name: Option<String>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        CheckConfig {
            rom_dir: PathBuf::from("roms"),
            extra_dirs: Vec::new(),
            roms_zipped: true,
            fix: false,
            verbose: false,
            complete_only: false,
            keep_old_duplicate: false,
            move_from_extra: false,
            check_integrity: false,
            move_long: true,
            move_unknown: true,
            report_correct: false,
            report_detailed: false,
            report_fixable: true,
            report_missing: true,
            report_summary: false,
            cache_file_name: None,
        }
    }
}

/// One entry queued for deletion after the traversal.
#[derive(Debug, Clone)]
pub struct DeleteItem {
    pub archive: PathBuf,
    pub backend: BackendKind,
    pub entry: String,
}

/// State for one check run. Created before the first archive is opened,
/// dismantled after the last commit.
pub struct CheckContext {
    pub db: RomDb,
    pub old_db: Option<RomDb>,
    pub config: CheckConfig,
    pub index: FileIndex,
    pub catalog: CatalogIndex,
    pub caches: CacheRegistry,
    pub detector: Option<Detector>,
    pub fixdat: Option<Fixdat>,
    /// Consumed donors in the needed pool, deleted after the traversal.
    pub delete_needed: Vec<DeleteItem>,
    /// Consumed donors in extra directories, deleted after the traversal.
    pub delete_extra: Vec<DeleteItem>,
    /// Superfluous containers in the ROM directory.
    pub delete_superfluous: Vec<PathBuf>,
    stop: Arc<AtomicBool>,
}

impl CheckContext {
    /// Build the run state: seed the donor index from the old database
    /// and the catalog index from the game records.
    pub fn new(
        db: RomDb,
        old_db: Option<RomDb>,
        config: CheckConfig,
    ) -> Result<CheckContext, LibError> {
        let detector = db.read_detector()?;
        let caches = CacheRegistry::new(config.cache_file_name.clone());

        let mut index = FileIndex::new();
        if let Some(ref old) = old_db {
            for name in old.read_game_list()? {
                if let Some(game) = old.read_game(&name)? {
                    index.add_old_game(&game.name, game.roms());
                }
            }
        }

        let mut catalog = CatalogIndex::new();
        for name in db.read_game_list()? {
            if let Some(game) = db.read_game(&name)? {
                catalog.add_game(&game.name, game.role(Role::Rom).files.as_slice());
            }
        }

        Ok(CheckContext {
            db,
            old_db,
            config,
            index,
            catalog,
            caches,
            detector,
            fixdat: None,
            delete_needed: Vec::new(),
            delete_extra: Vec::new(),
            delete_superfluous: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Backend used for game containers under the current layout.
    pub fn backend(&self) -> BackendKind {
        if self.config.roms_zipped {
            BackendKind::Zip
        } else {
            BackendKind::Dir
        }
    }

    /// Container path for a game in the ROM directory.
    pub fn game_path(&self, game: &str) -> PathBuf {
        if self.config.roms_zipped {
            self.config.rom_dir.join(format!("{}.zip", game))
        } else {
            self.config.rom_dir.join(game)
        }
    }

    pub fn needed_dir(&self) -> PathBuf {
        self.config.rom_dir.join(NEEDED_DIR)
    }

    pub fn unknown_dir(&self) -> PathBuf {
        self.config.rom_dir.join(UNKNOWN_DIR)
    }

    /// Container path in the needed pool for files displaced from `game`.
    pub fn needed_path(&self, game: &str) -> PathBuf {
        if self.config.roms_zipped {
            self.needed_dir().join(format!("{}.zip", game))
        } else {
            self.needed_dir().join(game)
        }
    }

    /// Container path in the quarantine for files displaced from `game`.
    pub fn unknown_path(&self, game: &str) -> PathBuf {
        if self.config.roms_zipped {
            self.unknown_dir().join(format!("{}.zip", game))
        } else {
            self.unknown_dir().join(game)
        }
    }

    /// Whether the old database knows content with these hashes.
    pub fn in_old_db(&self, size: Option<u64>, hashes: &Hashes) -> bool {
        self.index.find_in(Source::Old, size, hashes).is_some()
    }

    /// A clone of the stop flag, for a signal handler to set.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Cache root covering `path`: the extra directory containing it, or
    /// the ROM directory.
    pub fn cache_root_for(&self, path: &Path) -> PathBuf {
        for extra in &self.config.extra_dirs {
            if path.starts_with(extra) {
                return extra.clone();
            }
        }
        self.config.rom_dir.clone()
    }

    /// Flush caches at end of run.
    pub fn close(&mut self) -> Result<(), LibError> {
        self.caches.flush()
    }
}
