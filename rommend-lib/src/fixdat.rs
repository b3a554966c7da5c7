//! Fixdat output: a Logiqx XML datfile of everything still missing after
//! a pass, suitable for feeding to a downloader.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::Writer;

use rommend_core::checksum::HashKind;
use rommend_core::file::FileDesc;

use crate::error::LibError;

/// Collects missing ROMs per game during the sweep and renders the
/// datfile at the end. Re-recording a game replaces its entry, so only
/// the final pass's state is written.
pub struct Fixdat {
    path: PathBuf,
    description: String,
    games: BTreeMap<String, Vec<FileDesc>>,
}

impl Fixdat {
    pub fn new(path: &Path, description: impl Into<String>) -> Fixdat {
        Fixdat {
            path: path.to_path_buf(),
            description: description.into(),
            games: BTreeMap::new(),
        }
    }

    /// Record the still-missing ROMs of `game`, replacing any earlier
    /// recording from a previous pass.
    pub fn record(&mut self, game: &str, missing: Vec<FileDesc>) {
        if missing.is_empty() {
            self.games.remove(game);
        } else {
            self.games.insert(game.to_string(), missing);
        }
    }

    /// Write the datfile. Games with nothing missing are absent.
    pub fn write(&self) -> Result<(), LibError> {
        let file = File::create(&self.path).map_err(LibError::io_at(&self.path))?;
        let mut xml = Writer::new_with_indent(BufWriter::new(file), b'\t', 1);

        let fail_io =
            |e: std::io::Error| LibError::def(format!("fixdat write failed: {}", e));

        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(fail_io)?;

        xml.create_element("datafile")
            .write_inner_content(|datafile| {
                datafile
                    .create_element("header")
                    .write_inner_content(|header| {
                        header
                            .create_element("name")
                            .write_text_content(BytesText::new("Fixdat"))?;
                        header
                            .create_element("description")
                            .write_text_content(BytesText::new(&self.description))?;
                        header
                            .create_element("version")
                            .write_text_content(BytesText::new("1"))?;
                        Ok(())
                    })?;

                for (game, files) in &self.games {
                    datafile
                        .create_element("game")
                        .with_attribute(("name", game.as_str()))
                        .write_inner_content(|game_el| {
                            for f in files {
                                let mut rom = game_el
                                    .create_element("rom")
                                    .with_attribute(("name", f.name.as_str()));
                                let size;
                                if let Some(s) = f.size {
                                    size = s.to_string();
                                    rom = rom.with_attribute(("size", size.as_str()));
                                }
                                let crc;
                                if let Some(hex) = f.hashes.hex(HashKind::Crc) {
                                    crc = hex;
                                    rom = rom.with_attribute(("crc", crc.as_str()));
                                }
                                let md5;
                                if let Some(hex) = f.hashes.hex(HashKind::Md5) {
                                    md5 = hex;
                                    rom = rom.with_attribute(("md5", md5.as_str()));
                                }
                                let sha1;
                                if let Some(hex) = f.hashes.hex(HashKind::Sha1) {
                                    sha1 = hex;
                                    rom = rom.with_attribute(("sha1", sha1.as_str()));
                                }
                                rom.write_empty()?;
                            }
                            Ok(())
                        })?;
                }
                Ok(())
            })
            .map_err(fail_io)?;

        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/fixdat_tests.rs"]
mod tests;
