//! The dump command: print one game's database record.

use std::path::PathBuf;

use rommend_core::checksum::HashKind;
use rommend_core::game::Role;
use rommend_db::RomDb;
use rommend_lib::settings;

use crate::CliError;

pub(crate) fn run(game_name: &str, db_path: Option<PathBuf>) -> Result<(), CliError> {
    let db_path = settings::resolve_db_path(db_path);
    let db = RomDb::open_readonly(&db_path).map_err(|e| CliError::db_open(&db_path, e))?;

    let game = db
        .read_game(game_name)?
        .ok_or_else(|| CliError::Lib(rommend_lib::LibError::def(format!(
            "game '{}' not found in {}",
            game_name,
            db_path.display()
        ))))?;

    log::info!("Name:        {}", game.name);
    if let Some(ref description) = game.description {
        log::info!("Description: {}", description);
    }

    for role in Role::ALL {
        let view = game.role(role);
        if let Some(ref parent) = view.parent {
            log::info!("{}-parent:  {}", role.name(), parent);
        }
        if let Some(ref grandparent) = view.grandparent {
            log::info!("{}-grandparent: {}", role.name(), grandparent);
        }
        if !view.clones.is_empty() {
            log::info!("{}-clones: {}", role.name(), view.clones.join(", "));
        }
        for f in &view.files {
            let mut line = format!("{} {}", role.name(), f.name);
            if let Some(size) = f.size {
                line.push_str(&format!(" size {}", size));
            }
            for kind in HashKind::ALL {
                if let Some(hex) = f.hashes.hex(kind) {
                    line.push_str(&format!(" {} {}", kind.name(), hex));
                }
            }
            if let Some(ref merge) = f.merge {
                line.push_str(&format!(" merge {}", merge));
            }
            log::info!("  {}", line);
        }
    }

    for disk in &game.disks {
        let mut line = format!("disk {}", disk.name);
        for kind in HashKind::ALL {
            if let Some(hex) = disk.hashes.hex(kind) {
                line.push_str(&format!(" {} {}", kind.name(), hex));
            }
        }
        log::info!("  {}", line);
    }

    Ok(())
}
