// Database module
// LanceDB holds the ward vectors, SQLite holds the ingestion ledger

pub mod lancedb;
pub mod sqlite;

pub use self::lancedb::{EmbeddingRecord, SearchHit, VectorStore};
pub use self::sqlite::Database;
pub use self::sqlite::models::{IngestRun, RunCounts, RunStatus};
