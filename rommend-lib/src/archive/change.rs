//! Pending-change log entries for archives.
//!
//! Every mutation records a [`Change`] at the file's index; the bytes for
//! additions and replacements are staged out-of-line and referenced by a
//! [`DataSource`]. The variants are the full state machine: an index is
//! in exactly one of these states until commit or rollback clears it.

use std::path::PathBuf;

use rommend_core::file::FileDesc;

/// Where the bytes of a staged addition or replacement come from at
/// commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// A zero-length file.
    Empty,
    /// A staged sidecar file on disk, owned by the change log.
    File(PathBuf),
    /// An entry of another zip archive, transferred without recompression
    /// at commit. Only valid when the destination backend is zip.
    ZipEntry { archive: PathBuf, entry: String },
}

/// A live file moved out of the way into a sidecar, so its bytes survive
/// until commit decides their fate. Directory backend only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedOriginal {
    /// Where the file lived (and returns to on rollback).
    pub live_path: PathBuf,
    /// Where its bytes are now.
    pub data_path: PathBuf,
}

/// One index's pending state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Change {
    #[default]
    Unchanged,
    /// A new entry; `desc` lives on the archive entry itself.
    Added { data: DataSource },
    Deleted { original: Option<StagedOriginal> },
    Renamed {
        name: String,
        original: Option<StagedOriginal>,
    },
    /// Existing entry replaced with new content (and possibly a new
    /// name); `desc` describes the replacement.
    Replaced {
        desc: FileDesc,
        data: DataSource,
        original: Option<StagedOriginal>,
    },
}

impl Change {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Change::Unchanged)
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Change::Deleted { .. })
    }

    pub fn is_added(&self) -> bool {
        matches!(self, Change::Added { .. })
    }

    /// The name this index will carry after commit, if the change sets
    /// one.
    pub fn new_name(&self) -> Option<&str> {
        match self {
            Change::Renamed { name, .. } => Some(name),
            Change::Replaced { desc, .. } => Some(&desc.name),
            _ => None,
        }
    }

    /// The staged data source, for changes that carry one.
    pub fn data(&self) -> Option<&DataSource> {
        match self {
            Change::Added { data } | Change::Replaced { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn original(&self) -> Option<&StagedOriginal> {
        match self {
            Change::Deleted { original }
            | Change::Renamed { original, .. }
            | Change::Replaced { original, .. } => original.as_ref(),
            _ => None,
        }
    }
}
