//! CLI type definitions: command enums and argument structs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rommend")]
#[command(about = "Check and repair arcade ROM sets against a reference catalog", long_about = None)]
pub(crate) struct Cli {
    /// Only show warnings and errors (suppress normal output)
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Enable verbose output (print fixes as they are made)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write log output to a file (ANSI codes stripped)
    #[arg(long, global = true)]
    pub logfile: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments shared by commands that open the reference database.
#[derive(Args, Clone)]
pub(crate) struct DbArgs {
    /// Path to the reference database
    #[arg(short = 'D', long)]
    pub db: Option<PathBuf>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Build the reference database from a listinfo dump
    Import {
        /// The listinfo text file to ingest
        listinfo: PathBuf,

        #[command(flatten)]
        db: DbArgs,

        /// Record a header detector: strip this many leading bytes when
        /// plain hashes fail to match
        #[arg(long)]
        header_skip: Option<u64>,
    },

    /// Check the ROM set against the database, optionally fixing it
    Check {
        /// Games to check (default: all)
        games: Vec<String>,

        #[command(flatten)]
        db: DbArgs,

        /// Database of ROMs you already archived elsewhere
        #[arg(short = 'O', long)]
        old_db: Option<PathBuf>,

        /// ROM set directory
        #[arg(short = 'R', long)]
        rom_dir: Option<PathBuf>,

        /// Search for missing files in this directory (repeatable)
        #[arg(short = 'e', long = "extra")]
        extra_dirs: Vec<PathBuf>,

        /// Fix the ROM set in place
        #[arg(short = 'F', long)]
        fix: bool,

        /// ROMs are files in per-game directories, not zip archives
        #[arg(short = 'u', long)]
        unzipped: bool,

        /// Verify archive integrity (stored CRCs) while scanning
        #[arg(short = 'i', long)]
        integrity: bool,

        /// Only complete games count; skip fixes that leave a game partial
        #[arg(short = 'C', long)]
        complete_only: bool,

        /// Keep set copies of files that the old database already has
        #[arg(long)]
        keep_old_duplicate: bool,

        /// Delete files from extra directories once they have been used
        #[arg(short = 'j', long)]
        move_from_extra: bool,

        /// Report only: leave long files alone instead of trimming them
        #[arg(long)]
        no_move_long: bool,

        /// Do not touch unknown files when fixing
        #[arg(long)]
        ignore_unknown: bool,

        /// Report correct games too
        #[arg(short = 'c', long)]
        correct: bool,

        /// Report every file of every game
        #[arg(long)]
        detailed: bool,

        /// Don't report fixable errors
        #[arg(short = 'f', long)]
        no_fixable: bool,

        /// Don't report missing files
        #[arg(short = 'b', long)]
        no_missing: bool,

        /// Print a summary at the end
        #[arg(long)]
        summary: bool,

        /// Read the list of games to check from a file
        #[arg(short = 'T', long)]
        games_from: Option<PathBuf>,

        /// Write a fixdat of everything still missing
        #[arg(long)]
        fixdat: Option<PathBuf>,

        /// Only scan for superfluous files; don't check any game
        #[arg(long)]
        superfluous_only: bool,
    },

    /// Print one game's database record
    Dump {
        /// Game name
        game: String,

        #[command(flatten)]
        db: DbArgs,
    },
}
