use thiserror::Error;

/// Errors from catalog parsing and ingestion.
#[derive(Debug, Error)]
pub enum DatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] rommend_db::DbError),

    #[error("line {line}: unterminated {block} block at end of input")]
    UnterminatedBlock { line: u64, block: &'static str },

    /// The stream parsed, but some games name a parent that never resolved
    /// (missing from the catalog, or part of a cycle). Their records are
    /// left in the database as written.
    #[error("dangling parent for {} game(s): {}", orphans.len(), orphans.join(", "))]
    DanglingParent { orphans: Vec<String> },

    #[error("internal inconsistency: {0}")]
    Inconsistent(String),
}
