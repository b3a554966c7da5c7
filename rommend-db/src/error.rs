use thiserror::Error;

/// Errors from the reference database.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unsupported database version: expected {expected}, found {found}")]
    Version { expected: i32, found: i32 },

    #[error("corrupt record for key {key:?}: {detail}")]
    Corrupt { key: String, detail: String },

    #[error("database is read-only")]
    ReadOnly,
}

impl DbError {
    pub fn corrupt(key: impl Into<String>, detail: impl Into<String>) -> Self {
        DbError::Corrupt {
            key: key.into(),
            detail: detail.into(),
        }
    }
}
