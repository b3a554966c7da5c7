//! The import command: listinfo text in, reference database out.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use rommend_dat::DatError;
use rommend_db::{Detector, RomDb};
use rommend_lib::settings;

use crate::CliError;

pub(crate) fn run(
    listinfo: &Path,
    db_path: Option<PathBuf>,
    header_skip: Option<u64>,
) -> Result<(), CliError> {
    let db_path = settings::resolve_db_path(db_path);

    // Rebuild from scratch: a stale database mixes catalogs.
    if db_path.exists() {
        fs::remove_file(&db_path).map_err(|e| CliError::io(&db_path, e))?;
    }
    let mut db = RomDb::open(&db_path).map_err(|e| CliError::db_open(&db_path, e))?;

    let file = fs::File::open(listinfo).map_err(|e| CliError::io(listinfo, e))?;
    let reader = BufReader::new(file);

    log::info!(
        "Importing {} into {}",
        listinfo.display().if_supports_color(Stdout, |t| t.cyan()),
        db_path.display().if_supports_color(Stdout, |t| t.cyan()),
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("  {spinner:.cyan} {msg}").expect("static pattern"),
    );
    spinner.set_message("parsing catalog");
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));

    let result = rommend_dat::ingest(&mut db, reader, 0);
    spinner.finish_and_clear();

    if let Some(skip) = header_skip {
        db.write_detector(&Detector {
            name: "header skip".to_string(),
            version: "1".to_string(),
            skip,
        })?;
    }

    match result {
        Ok(stats) => {
            log::info!(
                "Imported {} games ({} roms, {} samples, {} disks)",
                stats.games,
                stats.roms,
                stats.samples,
                stats.disks,
            );
            if stats.deferred > 0 {
                log::info!("Resolved {} forward parent references", stats.deferred);
            }
            Ok(())
        }
        Err(DatError::DanglingParent { orphans }) => {
            // The database is on disk, but the catalog is inconsistent.
            log::error!(
                "{}",
                format!("{} game(s) reference parents that never resolved", orphans.len())
                    .if_supports_color(Stdout, |t| t.red()),
            );
            Err(DatError::DanglingParent { orphans }.into())
        }
        Err(e) => Err(e.into()),
    }
}
