//! rommend CLI
//!
//! Command-line interface for checking and repairing arcade-emulator ROM
//! collections against a reference catalog.

mod cli_types;
mod commands;
mod error;

use std::fs;
use std::io::Write;
use std::sync::Mutex;

use clap::Parser;
use log::LevelFilter;

use cli_types::{Cli, Commands};
use error::CliError;

// -- Custom logger --

struct CliLogger {
    level: LevelFilter,
    logfile: Option<Mutex<fs::File>>,
}

impl log::Log for CliLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let msg = record.args().to_string();

        // Terminal: warn/error to stderr, info to stdout
        if record.level() <= log::Level::Warn {
            eprintln!("{}", msg);
        } else {
            println!("{}", msg);
        }

        // Logfile: ANSI-stripped
        if let Some(ref file) = self.logfile {
            let stripped = strip_ansi_escapes::strip(&msg);
            let text = String::from_utf8_lossy(&stripped);
            if let Ok(mut guard) = file.lock() {
                let _ = writeln!(guard, "{}", text);
            }
        }
    }

    fn flush(&self) {
        if let Some(ref file) = self.logfile {
            if let Ok(mut guard) = file.lock() {
                let _ = std::io::Write::flush(&mut *guard);
            }
        }
    }
}

// -- Main --

fn main() {
    let cli = Cli::parse();
    let quiet = cli.quiet;

    let level = if quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    let logfile = cli.logfile.as_ref().map(|p| {
        let file = fs::File::create(p).unwrap_or_else(|e| {
            eprintln!("Error: could not create logfile {}: {}", p.display(), e);
            std::process::exit(1);
        });
        Mutex::new(file)
    });
    let logger = Box::new(CliLogger { level, logfile });
    log::set_boxed_logger(logger).expect("Failed to set logger");
    log::set_max_level(level);

    let result: Result<(), CliError> = match cli.command {
        Commands::Import {
            listinfo,
            db,
            header_skip,
        } => commands::import::run(&listinfo, db.db, header_skip),
        Commands::Check {
            games,
            db,
            old_db,
            rom_dir,
            extra_dirs,
            fix,
            unzipped,
            integrity,
            complete_only,
            keep_old_duplicate,
            move_from_extra,
            no_move_long,
            ignore_unknown,
            correct,
            detailed,
            no_fixable,
            no_missing,
            summary,
            games_from,
            fixdat,
            superfluous_only,
        } => commands::check::run(commands::check::CheckArgs {
            games,
            db: db.db,
            old_db,
            rom_dir,
            extra_dirs,
            fix,
            unzipped,
            integrity,
            complete_only,
            keep_old_duplicate,
            move_from_extra,
            no_move_long,
            ignore_unknown,
            correct,
            detailed,
            no_fixable,
            no_missing,
            summary,
            games_from,
            fixdat,
            superfluous_only,
            verbose: cli.verbose,
            quiet,
        }),
        Commands::Dump { game, db } => commands::dump::run(&game, db.db),
    };

    log::logger().flush();

    // Exit code 0 regardless of findings; 1 only for fatal errors.
    if let Err(e) = result {
        log::error!("rommend: {}", e);
        std::process::exit(1);
    }
}
