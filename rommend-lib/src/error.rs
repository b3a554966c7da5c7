//! Error type for the check engine.
//!
//! Failures carry the archive (and entry, where known) they happened in;
//! the Display output is what ends up in reports.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibError {
    /// Archive-level failure (bad zip, unreadable directory).
    #[error("{}: {detail}", archive.display())]
    Zip { archive: PathBuf, detail: String },

    /// Failure operating on one entry of an archive.
    #[error("{}: {file}: {detail}", archive.display())]
    ZipFile {
        archive: PathBuf,
        file: String,
        detail: String,
    },

    /// Plain filesystem failure outside any archive.
    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("database error: {0}")]
    Db(#[from] rommend_db::DbError),

    /// Catalog or configuration inconsistency.
    #[error("{0}")]
    Def(String),

    /// System error with OS detail.
    #[error("{detail}: {source}")]
    Sys {
        detail: String,
        #[source]
        source: io::Error,
    },
}

impl LibError {
    pub fn zip(archive: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        LibError::Zip {
            archive: archive.into(),
            detail: detail.into(),
        }
    }

    pub fn zip_file(
        archive: impl Into<PathBuf>,
        file: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        LibError::ZipFile {
            archive: archive.into(),
            file: file.into(),
            detail: detail.into(),
        }
    }

    pub fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LibError::File {
            path: path.into(),
            source,
        }
    }

    pub fn def(detail: impl Into<String>) -> Self {
        LibError::Def(detail.into())
    }

    pub fn sys(detail: impl Into<String>, source: io::Error) -> Self {
        LibError::Sys {
            detail: detail.into(),
            source,
        }
    }

    /// Shorthand for wrapping an I/O error on `path`.
    pub fn io_at(path: &Path) -> impl FnOnce(io::Error) -> LibError + '_ {
        move |source| LibError::file(path, source)
    }
}
