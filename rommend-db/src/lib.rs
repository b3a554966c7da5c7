//! Persistence layer for the reference database.
//!
//! The byte-level store is a single SQLite key/value table (via rusqlite
//! with the bundled feature); [`romdb::RomDb`] layers the typed game,
//! list, and metadata records on top of it.

pub mod error;
pub mod kv;
pub mod record;
pub mod romdb;

pub use error::DbError;
pub use kv::{KvBatch, KvStore};
pub use romdb::{DatEntry, Detector, ListKind, ProgInfo, RomDb};
