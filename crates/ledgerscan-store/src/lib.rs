//! LedgerScan Store: SQLite extraction records, correction history and
//! chunk embeddings.

pub mod embedding;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::SqliteStore;
pub use types::*;
