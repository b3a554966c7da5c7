//! Field-level encoding of database records.
//!
//! Strings are a u16 length followed by the bytes, with no terminator; an
//! empty string encodes an absent optional field. Integers are
//! little-endian. Arrays are a u32 element count followed by the
//! elements. Decoding is bounds-checked throughout and never panics on
//! truncated input.

use rommend_core::checksum::{HashKind, Hashes};
use rommend_core::file::{FileDesc, FileStatus, Where};
use rommend_core::game::{Game, GameDisk, Role};

/// Size value written for files whose size is not recorded.
const SIZE_UNKNOWN: u64 = u64::MAX;

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Accumulates one record.
#[derive(Default)]
pub struct RecordWriter {
    buf: Vec<u8>,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_string(&mut self, s: &str) {
        let len = s.len().min(u16::MAX as usize);
        self.put_u16(len as u16);
        self.buf.extend_from_slice(&s.as_bytes()[..len]);
    }

    pub fn put_opt_string(&mut self, s: Option<&str>) {
        self.put_string(s.unwrap_or(""));
    }

    pub fn put_bytes(&mut self, b: &[u8]) {
        self.buf.extend_from_slice(b);
    }

    pub fn put_string_array(&mut self, items: &[String]) {
        self.put_u32(items.len() as u32);
        for item in items {
            self.put_string(item);
        }
    }

    pub fn put_hashes(&mut self, h: &Hashes) {
        self.put_u8(h.kinds());
        for kind in HashKind::ALL {
            if let Some(bytes) = h.bytes(kind) {
                self.put_bytes(&bytes);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Decoding failure; carries a short description of what was expected.
#[derive(Debug)]
pub struct DecodeError(pub String);

impl DecodeError {
    fn new(what: &str) -> Self {
        DecodeError(format!("truncated record: expected {}", what))
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Walks one encoded record.
pub struct RecordReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        RecordReader { buf, pos: 0 }
    }

    pub fn at_end(&self) -> bool {
        self.pos == self.buf.len()
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], DecodeError> {
        if self.buf.len() - self.pos < n {
            return Err(DecodeError::new(what));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1, "u8")?[0])
    }

    pub fn get_u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.take(2, "u16")?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn get_u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4, "u32")?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_u64(&mut self) -> Result<u64, DecodeError> {
        let b = self.take(8, "u64")?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_le_bytes(a))
    }

    pub fn get_string(&mut self) -> Result<String, DecodeError> {
        let len = self.get_u16()? as usize;
        let bytes = self.take(len, "string body")?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::new("utf-8 string"))
    }

    pub fn get_opt_string(&mut self) -> Result<Option<String>, DecodeError> {
        let s = self.get_string()?;
        Ok(if s.is_empty() { None } else { Some(s) })
    }

    pub fn get_string_array(&mut self) -> Result<Vec<String>, DecodeError> {
        let count = self.get_u32()? as usize;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(self.get_string()?);
        }
        Ok(items)
    }

    pub fn get_hashes(&mut self) -> Result<Hashes, DecodeError> {
        let kinds = self.get_u8()?;
        let mut hashes = Hashes::new();
        for kind in HashKind::ALL {
            if kinds & kind.bit() != 0 {
                let bytes = self.take(kind.len(), kind.name())?;
                hashes
                    .set_bytes(kind, bytes)
                    .map_err(|_| DecodeError::new(kind.name()))?;
            }
        }
        Ok(hashes)
    }
}

// ---------------------------------------------------------------------------
// Game record
// ---------------------------------------------------------------------------

fn put_file(w: &mut RecordWriter, f: &FileDesc) {
    w.put_string(&f.name);
    w.put_opt_string(f.merge.as_deref());
    w.put_string_array(&f.altnames);
    w.put_u64(f.size.unwrap_or(SIZE_UNKNOWN));
    w.put_hashes(&f.hashes);
    w.put_u8(f.status.as_u8());
    w.put_u8(f.where_.as_u8());
}

fn get_file(r: &mut RecordReader<'_>) -> Result<FileDesc, DecodeError> {
    let name = r.get_string()?;
    let merge = r.get_opt_string()?;
    let altnames = r.get_string_array()?;
    let size = match r.get_u64()? {
        SIZE_UNKNOWN => None,
        n => Some(n),
    };
    let hashes = r.get_hashes()?;
    let status =
        FileStatus::from_u8(r.get_u8()?).ok_or_else(|| DecodeError::new("file status"))?;
    let where_ = Where::from_u8(r.get_u8()?).ok_or_else(|| DecodeError::new("file where"))?;
    Ok(FileDesc {
        name,
        merge,
        altnames,
        size,
        hashes,
        mtime: 0,
        status,
        where_,
    })
}

fn put_role(w: &mut RecordWriter, game: &Game, role: Role) {
    let view = game.role(role);
    w.put_opt_string(view.parent.as_deref());
    w.put_opt_string(view.grandparent.as_deref());
    let mut clones = view.clones.clone();
    clones.sort_by(|a, b| rommend_core::util::name_cmp(a, b));
    w.put_string_array(&clones);
    w.put_u32(view.files.len() as u32);
    for f in &view.files {
        put_file(w, f);
    }
}

fn get_role(r: &mut RecordReader<'_>, game: &mut Game, role: Role) -> Result<(), DecodeError> {
    let parent = r.get_opt_string()?;
    let grandparent = r.get_opt_string()?;
    let clones = r.get_string_array()?;
    let count = r.get_u32()? as usize;
    let mut files = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        files.push(get_file(r)?);
    }
    let view = game.role_mut(role);
    view.parent = parent;
    view.grandparent = grandparent;
    view.clones = clones;
    view.files = files;
    Ok(())
}

/// Encode a full game record. The game's name is the key, not part of the
/// value.
pub fn encode_game(game: &Game) -> Vec<u8> {
    let mut w = RecordWriter::new();
    w.put_opt_string(game.description.as_deref());
    w.put_u32(game.dat_no);
    put_role(&mut w, game, Role::Rom);
    put_role(&mut w, game, Role::Sample);
    w.put_u32(game.disks.len() as u32);
    for disk in &game.disks {
        w.put_string(&disk.name);
        w.put_hashes(&disk.hashes);
        w.put_u8(disk.status.as_u8());
    }
    w.into_bytes()
}

/// Decode a game record stored under `name`.
pub fn decode_game(name: &str, bytes: &[u8]) -> Result<Game, DecodeError> {
    let mut r = RecordReader::new(bytes);
    let mut game = Game::new(name);
    game.description = r.get_opt_string()?;
    game.dat_no = r.get_u32()?;
    get_role(&mut r, &mut game, Role::Rom)?;
    get_role(&mut r, &mut game, Role::Sample)?;
    let ndisks = r.get_u32()? as usize;
    for _ in 0..ndisks {
        let disk_name = r.get_string()?;
        let hashes = r.get_hashes()?;
        let status =
            FileStatus::from_u8(r.get_u8()?).ok_or_else(|| DecodeError::new("disk status"))?;
        game.disks.push(GameDisk {
            name: disk_name,
            hashes,
            status,
        });
    }
    if !r.at_end() {
        return Err(DecodeError("trailing bytes after game record".to_string()));
    }
    Ok(game)
}

#[cfg(test)]
#[path = "tests/record_tests.rs"]
mod tests;
