//! Typed façade over the key/value store.
//!
//! Well-known keys:
//!
//! - `/list` — sorted list of game names
//! - `/list/game`, `/list/disk`, `/list/sample` — member names by kind
//! - `/prog` — emulator name and version
//! - `/dat` — dat file entries (name, description, version)
//! - `/detector` — optional header detector
//! - `<game-name>` — one game record

use std::path::Path;

use rommend_core::game::Game;

use crate::error::DbError;
use crate::kv::KvStore;
use crate::record::{self, RecordReader, RecordWriter};

const KEY_LIST: &str = "/list";
const KEY_PROG: &str = "/prog";
const KEY_DAT: &str = "/dat";
const KEY_DETECTOR: &str = "/detector";

/// The name lists kept alongside the game records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Game,
    Disk,
    Sample,
}

impl ListKind {
    fn key(self) -> &'static str {
        match self {
            ListKind::Game => "/list/game",
            ListKind::Disk => "/list/disk",
            ListKind::Sample => "/list/sample",
        }
    }
}

/// Emulator name and version recorded by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// One dat file the database was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatEntry {
    pub name: String,
    pub description: String,
    pub version: String,
}

/// A stored header detector: files are re-hashed with the first `skip`
/// bytes removed when plain hashes fail to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detector {
    pub name: String,
    pub version: String,
    pub skip: u64,
}

/// The reference database.
pub struct RomDb {
    kv: KvStore,
}

impl RomDb {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Ok(RomDb {
            kv: KvStore::open(path)?,
        })
    }

    pub fn open_readonly(path: &Path) -> Result<Self, DbError> {
        Ok(RomDb {
            kv: KvStore::open_readonly(path)?,
        })
    }

    pub fn open_memory() -> Result<Self, DbError> {
        Ok(RomDb {
            kv: KvStore::open_memory()?,
        })
    }

    // -- games --

    pub fn read_game(&self, name: &str) -> Result<Option<Game>, DbError> {
        match self.kv.get(name)? {
            None => Ok(None),
            Some(bytes) => record::decode_game(name, &bytes)
                .map(Some)
                .map_err(|e| DbError::corrupt(name, e.to_string())),
        }
    }

    pub fn write_game(&mut self, game: &Game) -> Result<(), DbError> {
        let bytes = record::encode_game(game);
        self.kv.put(&game.name, &bytes)
    }

    pub fn delete_game(&mut self, name: &str) -> Result<(), DbError> {
        self.kv.delete(name)
    }

    pub fn has_game(&self, name: &str) -> Result<bool, DbError> {
        Ok(self.kv.get(name)?.is_some())
    }

    // -- lists --

    /// The sorted list of all game names.
    pub fn read_game_list(&self) -> Result<Vec<String>, DbError> {
        self.read_list_at(KEY_LIST)
    }

    pub fn write_game_list(&mut self, names: &[String]) -> Result<(), DbError> {
        self.write_list_at(KEY_LIST, names)
    }

    pub fn read_list(&self, kind: ListKind) -> Result<Vec<String>, DbError> {
        self.read_list_at(kind.key())
    }

    pub fn write_list(&mut self, kind: ListKind, names: &[String]) -> Result<(), DbError> {
        self.write_list_at(kind.key(), names)
    }

    fn read_list_at(&self, key: &str) -> Result<Vec<String>, DbError> {
        match self.kv.get(key)? {
            None => Ok(Vec::new()),
            Some(bytes) => {
                let mut r = RecordReader::new(&bytes);
                r.get_string_array()
                    .map_err(|e| DbError::corrupt(key, e.to_string()))
            }
        }
    }

    fn write_list_at(&mut self, key: &str, names: &[String]) -> Result<(), DbError> {
        let mut w = RecordWriter::new();
        w.put_string_array(names);
        self.kv.put(key, &w.into_bytes())
    }

    // -- metadata --

    pub fn read_prog(&self) -> Result<ProgInfo, DbError> {
        match self.kv.get(KEY_PROG)? {
            None => Ok(ProgInfo::default()),
            Some(bytes) => {
                let mut r = RecordReader::new(&bytes);
                let name = r
                    .get_opt_string()
                    .map_err(|e| DbError::corrupt(KEY_PROG, e.to_string()))?;
                let version = r
                    .get_opt_string()
                    .map_err(|e| DbError::corrupt(KEY_PROG, e.to_string()))?;
                Ok(ProgInfo { name, version })
            }
        }
    }

    pub fn write_prog(&mut self, prog: &ProgInfo) -> Result<(), DbError> {
        let mut w = RecordWriter::new();
        w.put_opt_string(prog.name.as_deref());
        w.put_opt_string(prog.version.as_deref());
        self.kv.put(KEY_PROG, &w.into_bytes())
    }

    pub fn read_dat_entries(&self) -> Result<Vec<DatEntry>, DbError> {
        match self.kv.get(KEY_DAT)? {
            None => Ok(Vec::new()),
            Some(bytes) => {
                let mut r = RecordReader::new(&bytes);
                let count = r
                    .get_u32()
                    .map_err(|e| DbError::corrupt(KEY_DAT, e.to_string()))?;
                let mut entries = Vec::new();
                for _ in 0..count {
                    let entry = (|| -> Result<DatEntry, record::DecodeError> {
                        Ok(DatEntry {
                            name: r.get_string()?,
                            description: r.get_string()?,
                            version: r.get_string()?,
                        })
                    })()
                    .map_err(|e| DbError::corrupt(KEY_DAT, e.to_string()))?;
                    entries.push(entry);
                }
                Ok(entries)
            }
        }
    }

    pub fn write_dat_entries(&mut self, entries: &[DatEntry]) -> Result<(), DbError> {
        let mut w = RecordWriter::new();
        w.put_u32(entries.len() as u32);
        for entry in entries {
            w.put_string(&entry.name);
            w.put_string(&entry.description);
            w.put_string(&entry.version);
        }
        self.kv.put(KEY_DAT, &w.into_bytes())
    }

    pub fn read_detector(&self) -> Result<Option<Detector>, DbError> {
        match self.kv.get(KEY_DETECTOR)? {
            None => Ok(None),
            Some(bytes) => {
                let mut r = RecordReader::new(&bytes);
                let detector = (|| -> Result<Detector, record::DecodeError> {
                    Ok(Detector {
                        name: r.get_string()?,
                        version: r.get_string()?,
                        skip: r.get_u64()?,
                    })
                })()
                .map_err(|e| DbError::corrupt(KEY_DETECTOR, e.to_string()))?;
                Ok(Some(detector))
            }
        }
    }

    pub fn write_detector(&mut self, detector: &Detector) -> Result<(), DbError> {
        let mut w = RecordWriter::new();
        w.put_string(&detector.name);
        w.put_string(&detector.version);
        w.put_u64(detector.skip);
        self.kv.put(KEY_DETECTOR, &w.into_bytes())
    }
}

#[cfg(test)]
#[path = "tests/romdb_tests.rs"]
mod tests;
