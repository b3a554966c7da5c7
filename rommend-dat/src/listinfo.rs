//! Parser for listinfo dumps: a token stream of `game ( ... )` blocks
//! describing names, ROMs, samples, disks, and family links.
//!
//! The grammar is a three-state machine (top level, emulator block, game
//! block). Unknown tokens are skipped with a warning; only an unterminated
//! block at end of input is fatal.

use std::io::BufRead;

use log::warn;

use rommend_core::checksum::{HashCompare, HashKind};
use rommend_core::file::{FileDesc, FileStatus};
use rommend_core::game::{Game, GameDisk, Role};
use rommend_db::ProgInfo;

use crate::error::DatError;
use crate::tokenizer::{Line, LineReader, Tokenizer};

#[derive(PartialEq)]
enum State {
    Top,
    Emulator,
    Game,
}

/// Parse a listinfo stream, handing each completed game to `emit` and
/// returning the emulator block's name/version.
///
/// `emit` receives games in input order, after in-game ROM
/// de-duplication but before any family resolution.
pub fn parse_listinfo<R, F>(input: R, mut emit: F) -> Result<ProgInfo, DatError>
where
    R: BufRead,
    F: FnMut(Game) -> Result<(), DatError>,
{
    let mut reader = LineReader::new(input);
    let mut state = State::Top;
    let mut prog = ProgInfo::default();
    let mut game: Option<Game> = None;
    let mut block_line = 0;

    loop {
        let line = match reader.next_line()? {
            None => break,
            Some(line) => line,
        };

        let (no, text) = match line {
            Line::Skipped { no, first_word } => {
                // History blocks routinely blow the line limit; everything
                // else gets a warning.
                if first_word != "history" {
                    warn!("line {}: line too long (ignored)", no);
                }
                continue;
            }
            Line::Text { no, text } => (no, text),
        };

        let mut tok = Tokenizer::new(text);
        let cmd = match tok.next_token() {
            None => continue,
            Some(cmd) => cmd,
        };

        match state {
            State::Top => match cmd {
                // game/resource for MAME and friends, machine for MESS
                "game" | "machine" | "resource" => {
                    game = Some(Game::default());
                    block_line = no;
                    state = State::Game;
                }
                "emulator" | "clrmamepro" => {
                    block_line = no;
                    state = State::Emulator;
                }
                _ => {}
            },

            State::Emulator => match cmd {
                "name" => prog.name = tok.next_token().map(str::to_string),
                "version" => prog.version = tok.next_token().map(str::to_string),
                ")" => state = State::Top,
                _ => {}
            },

            State::Game => {
                if cmd == ")" {
                    let done = game.take().ok_or_else(|| {
                        DatError::Inconsistent("game block closed twice".to_string())
                    })?;
                    if done.name.is_empty() {
                        warn!("line {}: game block without a name (ignored)", no);
                    } else {
                        emit(done)?;
                    }
                    state = State::Top;
                    continue;
                }

                let g = game.as_mut().ok_or_else(|| {
                    DatError::Inconsistent("in game state without a game".to_string())
                })?;
                match cmd {
                    "name" => {
                        g.name = tok.next_token().unwrap_or("").to_string();
                    }
                    "description" => {
                        let d = tok.next_token().unwrap_or("").to_string();
                        g.description = if d.is_empty() { None } else { Some(d) };
                    }
                    "romof" => {
                        g.role_mut(Role::Rom).parent = tok.next_token().map(str::to_string);
                    }
                    "sampleof" => {
                        g.role_mut(Role::Sample).parent = tok.next_token().map(str::to_string);
                    }
                    "rom" => {
                        if let Some(rom) = parse_rom(&mut tok, no) {
                            add_rom(g, rom);
                        }
                    }
                    "sample" => {
                        if let Some(name) = tok.next_token() {
                            g.role_mut(Role::Sample).files.push(FileDesc::new(name));
                        }
                    }
                    "disk" => {
                        if let Some(disk) = parse_disk(&mut tok, no) {
                            g.disks.push(disk);
                        }
                    }
                    "archive" => {
                        // Archive names carry no information we keep.
                    }
                    _ => {}
                }
            }
        }
    }

    match state {
        State::Top => Ok(prog),
        State::Emulator => Err(DatError::UnterminatedBlock {
            line: block_line,
            block: "emulator",
        }),
        State::Game => Err(DatError::UnterminatedBlock {
            line: block_line,
            block: "game",
        }),
    }
}

/// Parse the attribute list of a `rom ( ... )` line.
///
/// `name`, `size`, and at least one digest are required; `merge`, `md5`,
/// `sha1`, and `flags` are optional. Malformed entries are skipped with a
/// warning, never fatal.
fn parse_rom(tok: &mut Tokenizer<'_>, line: u64) -> Option<FileDesc> {
    if tok.next_token() != Some("(") {
        warn!("line {}: expected ( after rom (ignored)", line);
        return None;
    }

    let mut rom = FileDesc::default();
    let mut have_name = false;

    while let Some(key) = tok.next_token() {
        match key {
            ")" => break,
            "name" => {
                rom.name = tok.next_token().unwrap_or("").to_string();
                have_name = !rom.name.is_empty();
            }
            "merge" => {
                rom.merge = tok.next_token().map(str::to_string);
            }
            "size" => {
                let value = tok.next_token().unwrap_or("");
                match value.parse::<u64>() {
                    Ok(size) => rom.size = Some(size),
                    Err(_) => {
                        warn!("line {}: bad rom size {:?} (ignored)", line, value);
                    }
                }
            }
            "crc" | "crc32" => {
                let value = tok.next_token().unwrap_or("");
                let padded = format!("{:0>8}", value.to_ascii_lowercase());
                if rom.hashes.set_hex(HashKind::Crc, &padded).is_err() {
                    warn!("line {}: bad crc {:?} (ignored)", line, value);
                }
            }
            "md5" => {
                let value = tok.next_token().unwrap_or("").to_ascii_lowercase();
                if rom.hashes.set_hex(HashKind::Md5, &value).is_err() {
                    warn!("line {}: bad md5 {:?} (ignored)", line, value);
                }
            }
            "sha1" => {
                let value = tok.next_token().unwrap_or("").to_ascii_lowercase();
                if rom.hashes.set_hex(HashKind::Sha1, &value).is_err() {
                    warn!("line {}: bad sha1 {:?} (ignored)", line, value);
                }
            }
            "flags" | "status" => match tok.next_token() {
                Some("baddump") => rom.status = FileStatus::BadDump,
                Some("nodump") => rom.status = FileStatus::NoDump,
                _ => {}
            },
            _ => {
                // Unknown attribute; skip its value.
                tok.next_token();
            }
        }
    }

    if !have_name {
        warn!("line {}: rom without a name (ignored)", line);
        return None;
    }
    Some(rom)
}

fn parse_disk(tok: &mut Tokenizer<'_>, line: u64) -> Option<GameDisk> {
    if tok.next_token() != Some("(") {
        warn!("line {}: expected ( after disk (ignored)", line);
        return None;
    }

    let mut disk = GameDisk::default();
    let mut have_name = false;

    while let Some(key) = tok.next_token() {
        match key {
            ")" => break,
            "name" => {
                disk.name = tok.next_token().unwrap_or("").to_string();
                have_name = !disk.name.is_empty();
            }
            "md5" => {
                let value = tok.next_token().unwrap_or("").to_ascii_lowercase();
                if disk.hashes.set_hex(HashKind::Md5, &value).is_err() {
                    warn!("line {}: bad disk md5 {:?} (ignored)", line, value);
                }
            }
            "sha1" => {
                let value = tok.next_token().unwrap_or("").to_ascii_lowercase();
                if disk.hashes.set_hex(HashKind::Sha1, &value).is_err() {
                    warn!("line {}: bad disk sha1 {:?} (ignored)", line, value);
                }
            }
            "flags" | "status" => match tok.next_token() {
                Some("baddump") => disk.status = FileStatus::BadDump,
                Some("nodump") => disk.status = FileStatus::NoDump,
                _ => {}
            },
            _ => {
                tok.next_token();
            }
        }
    }

    if !have_name {
        warn!("line {}: disk without a name (ignored)", line);
        return None;
    }
    Some(disk)
}

/// Add a ROM to the game under construction, folding duplicates.
///
/// An entry identical to an earlier one (same name, size, matching hashes)
/// is dropped. An entry with the same content and merge target but a
/// different name becomes an alternate name of the earlier entry.
fn add_rom(game: &mut Game, rom: FileDesc) {
    let files = &mut game.role_mut(Role::Rom).files;

    for earlier in files.iter() {
        if earlier.answers_to(&rom.name)
            && earlier.size == rom.size
            && earlier.hashes.compare(&rom.hashes) == HashCompare::Match
        {
            return;
        }
    }

    for earlier in files.iter_mut() {
        if earlier.size == rom.size
            && earlier.hashes.compare(&rom.hashes) == HashCompare::Match
            && earlier.merge == rom.merge
            && earlier.name != rom.name
        {
            earlier.add_altname(rom.name);
            return;
        }
    }

    files.push(rom);
}

#[cfg(test)]
#[path = "tests/listinfo_tests.rs"]
mod tests;
