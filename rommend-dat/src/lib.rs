//! Catalog ingestion: parsing listinfo text and building the reference
//! database, including resolution of the parent/clone family graph.

pub mod error;
pub mod ingest;
pub mod listinfo;
pub mod tokenizer;

pub use error::DatError;
pub use ingest::{ingest, IngestStats};
pub use listinfo::parse_listinfo;
