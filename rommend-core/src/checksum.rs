//! Multi-algorithm hash sets with partial presence.
//!
//! A [`Hashes`] value carries, independently per algorithm, either no digest
//! or a digest of that algorithm's fixed length. Comparison is three-valued:
//! two hash sets with no algorithm in common are neither equal nor unequal.

use std::fmt;
use std::io::Read;

use md5::Context as Md5Context;
use sha1::{Digest, Sha1};

/// Chunk size for streaming hash computation.
const CHUNK_SIZE: usize = 64 * 1024;

/// The digest algorithms a catalog or archive entry may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKind {
    Crc,
    Md5,
    Sha1,
}

impl HashKind {
    /// Bit used in the "kinds present" bitmap.
    pub fn bit(self) -> u8 {
        match self {
            HashKind::Crc => 1 << 0,
            HashKind::Md5 => 1 << 1,
            HashKind::Sha1 => 1 << 2,
        }
    }

    /// Digest length in bytes.
    pub fn len(self) -> usize {
        match self {
            HashKind::Crc => 4,
            HashKind::Md5 => 16,
            HashKind::Sha1 => 20,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HashKind::Crc => "crc",
            HashKind::Md5 => "md5",
            HashKind::Sha1 => "sha1",
        }
    }

    pub const ALL: [HashKind; 3] = [HashKind::Crc, HashKind::Md5, HashKind::Sha1];
}

/// Outcome of comparing two hash sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashCompare {
    /// At least one algorithm in common, and every shared algorithm agrees.
    Match,
    /// Some shared algorithm disagrees.
    Mismatch,
    /// The two sets have no algorithm in common.
    NoCommon,
}

/// A set of digests, any subset of {CRC-32, MD5, SHA-1}.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hashes {
    pub crc: Option<u32>,
    pub md5: Option<[u8; 16]>,
    pub sha1: Option<[u8; 20]>,
}

impl Hashes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bitmap of the algorithms present in this set.
    pub fn kinds(&self) -> u8 {
        let mut bits = 0;
        if self.crc.is_some() {
            bits |= HashKind::Crc.bit();
        }
        if self.md5.is_some() {
            bits |= HashKind::Md5.bit();
        }
        if self.sha1.is_some() {
            bits |= HashKind::Sha1.bit();
        }
        bits
    }

    pub fn has(&self, kind: HashKind) -> bool {
        self.kinds() & kind.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.kinds() == 0
    }

    /// Digest bytes for one algorithm, big-endian for CRC-32.
    pub fn bytes(&self, kind: HashKind) -> Option<Vec<u8>> {
        match kind {
            HashKind::Crc => self.crc.map(|c| c.to_be_bytes().to_vec()),
            HashKind::Md5 => self.md5.map(|d| d.to_vec()),
            HashKind::Sha1 => self.sha1.map(|d| d.to_vec()),
        }
    }

    /// Set one algorithm's digest from raw bytes. The slice length must
    /// equal the algorithm's digest length.
    pub fn set_bytes(&mut self, kind: HashKind, bytes: &[u8]) -> Result<(), HashParseError> {
        if bytes.len() != kind.len() {
            return Err(HashParseError::BadLength {
                kind,
                expected: kind.len(),
                found: bytes.len(),
            });
        }
        match kind {
            HashKind::Crc => {
                let mut b = [0u8; 4];
                b.copy_from_slice(bytes);
                self.crc = Some(u32::from_be_bytes(b));
            }
            HashKind::Md5 => {
                let mut b = [0u8; 16];
                b.copy_from_slice(bytes);
                self.md5 = Some(b);
            }
            HashKind::Sha1 => {
                let mut b = [0u8; 20];
                b.copy_from_slice(bytes);
                self.sha1 = Some(b);
            }
        }
        Ok(())
    }

    /// Parse a lowercase/uppercase hex digest for one algorithm.
    pub fn set_hex(&mut self, kind: HashKind, hex: &str) -> Result<(), HashParseError> {
        let bytes = parse_hex(hex).ok_or_else(|| HashParseError::BadHex {
            kind,
            text: hex.to_string(),
        })?;
        self.set_bytes(kind, &bytes)
    }

    /// Lowercase hex rendering of one algorithm's digest, if present.
    pub fn hex(&self, kind: HashKind) -> Option<String> {
        self.bytes(kind).map(|b| to_hex(&b))
    }

    /// Three-valued comparison over the shared algorithms.
    pub fn compare(&self, other: &Hashes) -> HashCompare {
        let common = self.kinds() & other.kinds();
        if common == 0 {
            return HashCompare::NoCommon;
        }
        if common & HashKind::Crc.bit() != 0 && self.crc != other.crc {
            return HashCompare::Mismatch;
        }
        if common & HashKind::Md5.bit() != 0 && self.md5 != other.md5 {
            return HashCompare::Mismatch;
        }
        if common & HashKind::Sha1.bit() != 0 && self.sha1 != other.sha1 {
            return HashCompare::Mismatch;
        }
        HashCompare::Match
    }

    /// Copy every algorithm present in `other` into `self`.
    pub fn merge(&mut self, other: &Hashes) {
        if other.crc.is_some() {
            self.crc = other.crc;
        }
        if other.md5.is_some() {
            self.md5 = other.md5;
        }
        if other.sha1.is_some() {
            self.sha1 = other.sha1;
        }
    }
}

impl fmt::Display for Hashes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for kind in HashKind::ALL {
            if let Some(hex) = self.hex(kind) {
                if !first {
                    write!(f, " ")?;
                }
                write!(f, "{} {}", kind.name(), hex)?;
                first = false;
            }
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}

/// Error parsing a digest from text or raw bytes.
#[derive(Debug, thiserror::Error)]
pub enum HashParseError {
    #[error("bad {} digest length: expected {expected} bytes, found {found}", kind.name())]
    BadLength {
        kind: HashKind,
        expected: usize,
        found: usize,
    },
    #[error("bad {} hex digest: {text:?}", kind.name())]
    BadHex { kind: HashKind, text: String },
}

/// Streaming computation of all three digests at once.
pub struct Hasher {
    crc: crc32fast::Hasher,
    md5: Md5Context,
    sha1: Sha1,
    bytes: u64,
}

impl Hasher {
    pub fn new() -> Self {
        Self {
            crc: crc32fast::Hasher::new(),
            md5: Md5Context::new(),
            sha1: Sha1::new(),
            bytes: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.crc.update(data);
        self.md5.consume(data);
        self.sha1.update(data);
        self.bytes += data.len() as u64;
    }

    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    pub fn finalize(self) -> Hashes {
        let md5 = self.md5.compute().0;
        let sha1: [u8; 20] = self.sha1.finalize().into();
        Hashes {
            crc: Some(self.crc.finalize()),
            md5: Some(md5),
            sha1: Some(sha1),
        }
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a reader to the end, or over the first `limit` bytes only.
///
/// Returns the number of bytes hashed along with the digests, so callers
/// can detect short reads against an expected size.
pub fn hash_reader<R: Read>(reader: &mut R, limit: Option<u64>) -> std::io::Result<(u64, Hashes)> {
    let mut hasher = Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut remaining = limit;

    loop {
        let want = match remaining {
            Some(0) => break,
            Some(n) => (n as usize).min(buf.len()),
            None => buf.len(),
        };
        let n = reader.read(&mut buf[..want])?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        if let Some(ref mut r) = remaining {
            *r -= n as u64;
        }
    }

    let bytes = hasher.bytes_hashed();
    Ok((bytes, hasher.finalize()))
}

fn parse_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
#[path = "tests/checksum_tests.rs"]
mod tests;
