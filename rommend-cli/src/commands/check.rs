//! The check command: drive a sweep over the ROM set.

use std::fs;
use std::io::BufRead;
use std::path::PathBuf;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use rommend_db::RomDb;
use rommend_lib::fixdat::Fixdat;
use rommend_lib::{settings, sweep, CheckConfig, CheckContext};

use crate::CliError;

pub(crate) struct CheckArgs {
    pub games: Vec<String>,
    pub db: Option<PathBuf>,
    pub old_db: Option<PathBuf>,
    pub rom_dir: Option<PathBuf>,
    pub extra_dirs: Vec<PathBuf>,
    pub fix: bool,
    pub unzipped: bool,
    pub integrity: bool,
    pub complete_only: bool,
    pub keep_old_duplicate: bool,
    pub move_from_extra: bool,
    pub no_move_long: bool,
    pub ignore_unknown: bool,
    pub correct: bool,
    pub detailed: bool,
    pub no_fixable: bool,
    pub no_missing: bool,
    pub summary: bool,
    pub games_from: Option<PathBuf>,
    pub fixdat: Option<PathBuf>,
    pub superfluous_only: bool,
    pub verbose: bool,
    pub quiet: bool,
}

pub(crate) fn run(args: CheckArgs) -> Result<(), CliError> {
    let db_path = settings::resolve_db_path(args.db);
    let db = RomDb::open_readonly(&db_path).map_err(|e| CliError::db_open(&db_path, e))?;

    let old_db = match settings::resolve_old_db_path(args.old_db) {
        Some(path) if path.exists() => {
            Some(RomDb::open_readonly(&path).map_err(|e| CliError::db_open(&path, e))?)
        }
        _ => None,
    };

    let mut games = args.games;
    if let Some(ref list_path) = args.games_from {
        let file = fs::File::open(list_path).map_err(|e| CliError::io(list_path, e))?;
        for line in std::io::BufReader::new(file).lines() {
            let line = line.map_err(|e| CliError::io(list_path, e))?;
            let name = line.trim();
            if !name.is_empty() {
                games.push(name.to_string());
            }
        }
    }

    let config = CheckConfig {
        rom_dir: settings::resolve_rom_dir(args.rom_dir),
        extra_dirs: args.extra_dirs,
        roms_zipped: !args.unzipped,
        fix: args.fix,
        verbose: args.verbose,
        complete_only: args.complete_only,
        keep_old_duplicate: args.keep_old_duplicate,
        move_from_extra: args.move_from_extra,
        check_integrity: args.integrity,
        move_long: !args.no_move_long,
        move_unknown: !args.ignore_unknown,
        report_correct: args.correct,
        report_detailed: args.detailed,
        report_fixable: !args.no_fixable,
        report_missing: !args.no_missing,
        report_summary: args.summary,
        cache_file_name: None,
    };

    log::info!(
        "Checking ROM set in {}{}",
        config
            .rom_dir
            .display()
            .if_supports_color(Stdout, |t| t.cyan()),
        if config.fix { " (fixing)" } else { "" },
    );

    let mut ctx = CheckContext::new(db, old_db, config)?;

    if args.superfluous_only {
        rommend_lib::sweep::superfluous_only(&mut ctx)?;
        return Ok(());
    }

    if let Some(ref fixdat_path) = args.fixdat {
        ctx.fixdat = Some(Fixdat::new(fixdat_path, "Fixdat by rommend"));
    }

    let stats = sweep(&mut ctx, &games)?;

    if let Some(fixdat) = ctx.fixdat.take() {
        fixdat.write()?;
        if !args.quiet {
            log::info!(
                "Wrote fixdat to {}",
                args.fixdat
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
                    .if_supports_color(Stdout, |t| t.cyan()),
            );
        }
    }

    if stats.stopped {
        log::warn!("stopped before the end of the set");
    }

    Ok(())
}
