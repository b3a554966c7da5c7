//! Identity of CHD disk images without decompressing them.
//!
//! CHD headers embed the SHA-1 of the uncompressed data, which is all the
//! catalog records for a disk. Versions 4 and 5 are read; anything else
//! yields no digest and the disk is reported as unverifiable.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use rommend_core::checksum::Hashes;

use crate::error::LibError;

const CHD_MAGIC: &[u8; 8] = b"MComprHD";

/// Offset of the data SHA-1 within the header, per version.
const V4_SHA1_OFFSET: usize = 48;
const V5_SHA1_OFFSET: usize = 84;

const HEADER_MAX: usize = 124;

/// Digest information read from a disk image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskInfo {
    /// CHD version, or 0 for a raw (non-CHD) file.
    pub version: u32,
    pub hashes: Hashes,
}

/// Read the identity of a disk image.
///
/// CHD v4/v5 files report the embedded data SHA-1; raw files are hashed
/// in full; CHD versions without a known layout return empty hashes.
pub fn read_disk_info(path: &Path) -> Result<DiskInfo, LibError> {
    let mut file = File::open(path).map_err(LibError::io_at(path))?;

    let mut header = [0u8; HEADER_MAX];
    let mut filled = 0;
    while filled < header.len() {
        let n = file
            .read(&mut header[filled..])
            .map_err(LibError::io_at(path))?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    if filled < 16 || header[0..8] != CHD_MAGIC[..] {
        // Not a CHD; treat the raw contents as the disk data.
        let mut file = File::open(path).map_err(LibError::io_at(path))?;
        let (_, hashes) =
            rommend_core::checksum::hash_reader(&mut file, None).map_err(LibError::io_at(path))?;
        return Ok(DiskInfo { version: 0, hashes });
    }

    let version = u32::from_be_bytes([header[12], header[13], header[14], header[15]]);
    let sha1_offset = match version {
        4 => V4_SHA1_OFFSET,
        5 => V5_SHA1_OFFSET,
        _ => {
            return Ok(DiskInfo {
                version,
                hashes: Hashes::new(),
            })
        }
    };

    if filled < sha1_offset + 20 {
        return Err(LibError::zip(path, "truncated CHD header".to_string()));
    }

    let mut hashes = Hashes::new();
    let mut sha1 = [0u8; 20];
    sha1.copy_from_slice(&header[sha1_offset..sha1_offset + 20]);
    if sha1 != [0u8; 20] {
        hashes.sha1 = Some(sha1);
    }

    Ok(DiskInfo { version, hashes })
}

#[cfg(test)]
#[path = "tests/chd_tests.rs"]
mod tests;
