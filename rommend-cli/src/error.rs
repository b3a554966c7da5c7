use std::path::PathBuf;

use thiserror::Error;

/// CLI-level failures. All map to exit code 1; findings never do.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("can't open database {}: {source}", path.display())]
    DbOpen {
        path: PathBuf,
        #[source]
        source: rommend_db::DbError,
    },

    #[error("{0}")]
    Dat(#[from] rommend_dat::DatError),

    #[error("{0}")]
    Lib(#[from] rommend_lib::LibError),

    #[error("{0}")]
    Db(#[from] rommend_db::DbError),

    #[error("can't read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    pub fn db_open(path: impl Into<PathBuf>, source: rommend_db::DbError) -> Self {
        CliError::DbOpen {
            path: path.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CliError::Io {
            path: path.into(),
            source,
        }
    }
}
