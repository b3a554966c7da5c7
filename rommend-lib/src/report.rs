//! The single reporting surface for check findings.
//!
//! Findings go through the `log` facade. The per-game header is emitted
//! lazily, only once a finding survives the report filters, so quiet
//! games stay quiet.

use rommend_core::game::Game;
use rommend_core::util::format_bytes;

use crate::context::CheckConfig;
use crate::matcher::{DiskQuality, FileQuality, GameResult, GameStatus, Usage};

struct GameHeader<'a> {
    game: &'a str,
    printed: bool,
}

impl<'a> GameHeader<'a> {
    fn new(game: &'a str) -> Self {
        GameHeader {
            game,
            printed: false,
        }
    }

    fn line(&mut self, text: String) {
        if !self.printed {
            log::info!("In game {}:", self.game);
            self.printed = true;
        }
        log::info!("{}", text);
    }
}

/// Report one game's findings according to the configured filters.
pub fn report_game(config: &CheckConfig, game: &Game, result: &GameResult) {
    let mut header = GameHeader::new(&game.name);

    for (expected, quality) in game.roms().iter().zip(&result.files) {
        let size = expected
            .size
            .map(format_bytes)
            .unwrap_or_else(|| "unknown size".to_string());

        match quality {
            FileQuality::Ok => {
                if config.report_detailed {
                    header.line(format!("rom  {}: ok", expected.name));
                }
            }
            FileQuality::NoDump => {
                if config.report_detailed {
                    header.line(format!("rom  {}: no good dump exists", expected.name));
                }
            }
            FileQuality::Missing => {
                if config.report_missing {
                    header.line(format!("rom  {}: missing ({})", expected.name, size));
                }
            }
            FileQuality::NoHash => {
                if config.report_missing {
                    header.line(format!(
                        "rom  {}: no common checksum with file in archive",
                        expected.name
                    ));
                }
            }
            FileQuality::HashErr => {
                if config.report_missing {
                    header.line(format!("rom  {}: checksum mismatch", expected.name));
                }
            }
            FileQuality::NameErr { index } => {
                if config.report_fixable {
                    let found = result
                        .entry_names
                        .get(*index)
                        .map(String::as_str)
                        .unwrap_or("?");
                    header.line(format!("rom  {}: wrong name ({})", expected.name, found));
                }
            }
            FileQuality::Long { .. } => {
                if config.report_fixable {
                    header.line(format!(
                        "rom  {}: longer file with valid prefix ({})",
                        expected.name, size
                    ));
                }
            }
            FileQuality::Copied { location } => {
                if config.report_fixable {
                    let from = location
                        .archive
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "old database".to_string());
                    header.line(format!("rom  {}: can be copied from {}", expected.name, from));
                }
            }
            FileQuality::InZip { .. } => {
                if config.report_fixable {
                    header.line(format!(
                        "rom  {}: stored here, belongs with an ancestor",
                        expected.name
                    ));
                }
            }
            FileQuality::Old { game: old_game } => {
                if config.report_detailed {
                    let which = old_game.as_deref().unwrap_or("old database");
                    header.line(format!("rom  {}: present in {}", expected.name, which));
                }
            }
        }
    }

    for (index, usage) in result.usage.iter().enumerate() {
        let name = result
            .entry_names
            .get(index)
            .map(String::as_str)
            .unwrap_or("?");
        match usage {
            Usage::Unknown => {
                if config.report_fixable {
                    header.line(format!("file {}: unknown content", name));
                }
            }
            Usage::Needed => {
                if config.report_fixable {
                    header.line(format!("file {}: needed elsewhere", name));
                }
            }
            Usage::Duplicate => {
                if config.report_fixable {
                    header.line(format!("file {}: duplicate of old database", name));
                }
            }
            Usage::Broken => {
                header.line(format!("file {}: broken (integrity check failed)", name));
            }
            Usage::Used | Usage::PartUsed => {}
        }
    }

    for disk in &result.disks {
        match disk.quality {
            DiskQuality::Ok => {
                if config.report_detailed {
                    header.line(format!("disk {}: ok", disk.name));
                }
            }
            DiskQuality::Missing => {
                if config.report_missing {
                    header.line(format!("disk {}: missing", disk.name));
                }
            }
            DiskQuality::HashErr => {
                if config.report_missing {
                    header.line(format!("disk {}: checksum mismatch", disk.name));
                }
            }
            DiskQuality::NoHash => {
                if config.report_detailed {
                    header.line(format!("disk {}: no common checksum", disk.name));
                }
            }
            DiskQuality::NoDump => {
                if config.report_detailed {
                    header.line(format!("disk {}: no good dump exists", disk.name));
                }
            }
        }
    }

    if !header.printed && result.status == GameStatus::Correct && config.report_correct {
        log::info!("{}: correct", game.name);
    }
}

/// Report superfluous containers found in the ROM directory.
pub fn report_superfluous(paths: &[std::path::PathBuf]) {
    if paths.is_empty() {
        return;
    }
    log::info!("Superfluous files:");
    for path in paths {
        log::info!("    {}", path.display());
    }
}
