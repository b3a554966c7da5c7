//! The byte-level key/value store backing the reference database.
//!
//! One SQLite table maps string keys to blobs. Everything above this
//! module works in terms of `get`/`put`/`delete`/`list` plus an atomic
//! batch; nothing above it sees SQL.

use std::path::Path;

use rusqlite::{params, Connection, OpenFlags, Transaction};

use crate::error::DbError;

/// Bump when the record encoding changes; opening a store written with a
/// different version fails rather than misreading records.
pub const CURRENT_VERSION: i32 = 1;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL
);
";

/// A key/value store over one SQLite file.
pub struct KvStore {
    conn: Connection,
    writable: bool,
}

impl KvStore {
    /// Open or create a store at `path` for reading and writing.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = KvStore {
            conn,
            writable: true,
        };
        store.check_or_create_schema()?;
        Ok(store)
    }

    /// Open an existing store read-only. Fails if the file is missing or
    /// carries a different schema version.
    pub fn open_readonly(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let store = KvStore {
            conn,
            writable: false,
        };
        let version = store.schema_version()?;
        if version != CURRENT_VERSION {
            return Err(DbError::Version {
                expected: CURRENT_VERSION,
                found: version,
            });
        }
        Ok(store)
    }

    /// In-memory store with the full schema. Used by tests and by ingest
    /// dry runs.
    pub fn open_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let store = KvStore {
            conn,
            writable: true,
        };
        store.check_or_create_schema()?;
        Ok(store)
    }

    fn check_or_create_schema(&self) -> Result<(), DbError> {
        let version = self.schema_version()?;
        if version == 0 {
            self.conn.execute_batch(SCHEMA_SQL)?;
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [CURRENT_VERSION],
            )?;
            Ok(())
        } else if version == CURRENT_VERSION {
            Ok(())
        } else {
            Err(DbError::Version {
                expected: CURRENT_VERSION,
                found: version,
            })
        }
    }

    /// Schema version, or 0 when the file carries no schema yet.
    fn schema_version(&self) -> Result<i32, DbError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(0);
        }
        let version: i32 = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;
        Ok(version)
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DbError> {
        let mut stmt = self.conn.prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    pub fn put(&mut self, key: &str, value: &[u8]) -> Result<(), DbError> {
        if !self.writable {
            return Err(DbError::ReadOnly);
        }
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete(&mut self, key: &str) -> Result<(), DbError> {
        if !self.writable {
            return Err(DbError::ReadOnly);
        }
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// All keys starting with `prefix`, sorted.
    pub fn list(&self, prefix: &str) -> Result<Vec<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT key FROM kv WHERE key >= ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![prefix], |row| row.get::<_, String>(0))?;
        let mut keys = Vec::new();
        for key in rows {
            let key = key?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key);
        }
        Ok(keys)
    }

    /// Start an atomic batch. Changes are visible only after
    /// [`KvBatch::commit`]; dropping the batch rolls back.
    pub fn batch(&mut self) -> Result<KvBatch<'_>, DbError> {
        if !self.writable {
            return Err(DbError::ReadOnly);
        }
        let tx = self.conn.transaction()?;
        Ok(KvBatch { tx })
    }
}

/// An open write batch. Wraps a SQLite transaction.
pub struct KvBatch<'a> {
    tx: Transaction<'a>,
}

impl KvBatch<'_> {
    pub fn put(&self, key: &str, value: &[u8]) -> Result<(), DbError> {
        self.tx.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), DbError> {
        self.tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn commit(self) -> Result<(), DbError> {
        self.tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/kv_tests.rs"]
mod tests;
