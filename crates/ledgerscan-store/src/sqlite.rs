//! SQLite store for extraction records and chunk embeddings.
//!
//! One database file holds the `extractions` collection (keyed by content
//! hash), the per-document correction history and the chunk vectors used to
//! retrieve similar past documents.

use std::path::{Path, PathBuf};

use chrono::Utc;
use ndarray::Array1;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::embedding::{decode_f32_le, encode_f32_le};
use crate::schema::SCHEMA_SQL;
use crate::types::*;
use ledgerscan_core::{Error, Result};

pub const DB_FILE_NAME: &str = "ledgerscan.db";

/// SQLite-backed extraction and embedding store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create the store at `db_dir/ledgerscan.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join(DB_FILE_NAME);

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        let stats = store.get_stats()?;
        info!(
            "SqliteStore initialized: {} extractions, {} embeddings, path={}",
            stats.total_extractions,
            stats.embeddings_stored,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ---------------------------------------------------------------
    // Extractions
    // ---------------------------------------------------------------

    /// Reserve `document_id` with a pending record.
    ///
    /// A pending record left over from an interrupted run is refreshed in
    /// place. A complete record is never overwritten.
    pub fn insert_placeholder(&self, document_id: &str, file_name: &str) -> Result<()> {
        let now = now_rfc3339();
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "INSERT INTO extractions
                    (document_id, file_name, status, raw_json, final_json, meta_json, created_at, updated_at)
                 VALUES (?1, ?2, 'pending', '[]', '[]', '{}', ?3, ?3)
                 ON CONFLICT(document_id) DO UPDATE SET
                    file_name = excluded.file_name,
                    updated_at = excluded.updated_at
                 WHERE extractions.status = 'pending'",
                params![document_id, file_name, now],
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        if changed == 0 {
            return Err(Error::InvalidInput(format!(
                "extraction {} is already complete",
                document_id
            )));
        }
        debug!("Placeholder reserved for {}", document_id);
        Ok(())
    }

    /// Store the raw tokens and final rows and mark the record complete.
    pub fn complete_extraction(
        &self,
        document_id: &str,
        raw: &serde_json::Value,
        final_data: &serde_json::Value,
    ) -> Result<()> {
        let raw_json = serde_json::to_string(raw)?;
        let final_json = serde_json::to_string(final_data)?;
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE extractions
                 SET status = 'complete', raw_json = ?2, final_json = ?3, updated_at = ?4
                 WHERE document_id = ?1",
                params![document_id, raw_json, final_json, now_rfc3339()],
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        if changed == 0 {
            return Err(Error::NotFound(format!("extraction {}", document_id)));
        }
        info!("Extraction {} complete", document_id);
        Ok(())
    }

    pub fn get_extraction(&self, document_id: &str) -> Result<Option<Extraction>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT document_id, file_name, status, raw_json, final_json, meta_json,
                        created_at, updated_at
                 FROM extractions WHERE document_id = ?1",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let extraction = stmt
            .query_row(params![document_id], |row| Ok(Self::row_to_extraction(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        drop(stmt);

        match extraction {
            Some(mut extraction) => {
                extraction.corrections = Self::load_corrections(&conn, document_id)?;
                Ok(Some(extraction))
            }
            None => Ok(None),
        }
    }

    /// Final rows of a complete extraction; `None` when missing or pending.
    pub fn final_rows(&self, document_id: &str) -> Result<Option<Vec<serde_json::Value>>> {
        let conn = self.conn.lock();
        let final_json: Option<String> = conn
            .query_row(
                "SELECT final_json FROM extractions WHERE document_id = ?1 AND status = 'complete'",
                params![document_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(final_json.map(|json| match serde_json::from_str(&json) {
            Ok(serde_json::Value::Array(rows)) => rows,
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!("Unreadable final data for {}: {}", document_id, e);
                Vec::new()
            }
        }))
    }

    /// Replace the final rows, keeping the previous ones in the correction
    /// history. Returns `None` when the id is unknown.
    pub fn update_extraction_with_correction(
        &self,
        document_id: &str,
        new_final: &serde_json::Value,
    ) -> Result<Option<Extraction>> {
        let new_json = serde_json::to_string(new_final)?;
        {
            let mut conn = self.conn.lock();
            let tx = conn
                .transaction()
                .map_err(|e| Error::Database(e.to_string()))?;

            let previous: Option<String> = tx
                .query_row(
                    "SELECT final_json FROM extractions WHERE document_id = ?1",
                    params![document_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| Error::Database(e.to_string()))?;
            let Some(previous) = previous else {
                return Ok(None);
            };

            let version: i64 = tx
                .query_row(
                    "SELECT COALESCE(MAX(version), 0) + 1 FROM corrections WHERE document_id = ?1",
                    params![document_id],
                    |row| row.get(0),
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            let now = now_rfc3339();

            tx.execute(
                "INSERT INTO corrections (document_id, version, final_json, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![document_id, version, previous, now],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
            tx.execute(
                "UPDATE extractions SET final_json = ?2, updated_at = ?3 WHERE document_id = ?1",
                params![document_id, new_json, now],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
            tx.commit().map_err(|e| Error::Database(e.to_string()))?;

            info!("Correction v{} recorded for {}", version, document_id);
        }

        self.get_extraction(document_id)
    }

    pub fn count_extractions(&self, status: Option<ExtractionStatus>) -> Result<i64> {
        let conn = self.conn.lock();
        let count: rusqlite::Result<i64> = match status {
            Some(status) => conn.query_row(
                "SELECT COUNT(*) FROM extractions WHERE status = ?1",
                params![status.as_str()],
                |row| row.get(0),
            ),
            None => conn.query_row("SELECT COUNT(*) FROM extractions", [], |row| row.get(0)),
        };
        count.map_err(|e| Error::Database(e.to_string()))
    }

    fn load_corrections(conn: &Connection, document_id: &str) -> Result<Vec<Correction>> {
        let mut stmt = conn
            .prepare_cached(
                "SELECT version, final_json, created_at FROM corrections
                 WHERE document_id = ?1 ORDER BY version ASC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![document_id], |row| {
                Ok(Correction {
                    version: row.get(0)?,
                    final_data: parse_json_column(&row.get::<_, String>(1)?),
                    timestamp: row.get(2)?,
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ---------------------------------------------------------------
    // Chunk embeddings
    // ---------------------------------------------------------------

    /// Replace all chunk embeddings of `document_id`. Returns the number stored.
    pub fn store_embeddings(
        &self,
        document_id: &str,
        chunks: &[String],
        vectors: &[Array1<f32>],
    ) -> Result<usize> {
        if chunks.len() != vectors.len() {
            return Err(Error::InvalidInput(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                vectors.len()
            )));
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        tx.execute(
            "DELETE FROM chunk_embeddings WHERE document_id = ?1",
            params![document_id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO chunk_embeddings (document_id, chunk_index, text, embedding, dim)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            for (index, (text, vector)) in chunks.iter().zip(vectors).enumerate() {
                stmt.execute(params![
                    document_id,
                    index as i64,
                    text,
                    encode_f32_le(vector),
                    vector.len() as i64
                ])
                .map_err(|e| Error::Database(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;

        debug!("Stored {} chunk embeddings for {}", chunks.len(), document_id);
        Ok(chunks.len())
    }

    /// Every stored chunk vector, in insertion order.
    pub fn all_embeddings(&self) -> Result<Vec<StoredEmbedding>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT document_id, chunk_index, text, embedding FROM chunk_embeddings ORDER BY id ASC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut out = Vec::new();
        for row in rows {
            let (document_id, chunk_index, text, blob) =
                row.map_err(|e| Error::Database(e.to_string()))?;
            out.push(StoredEmbedding {
                document_id,
                chunk_index: chunk_index as usize,
                text,
                embedding: decode_f32_le(&blob)?,
            });
        }
        Ok(out)
    }

    // ---------------------------------------------------------------
    // Stats
    // ---------------------------------------------------------------

    /// Get store statistics.
    pub fn get_stats(&self) -> Result<StoreStats> {
        let total = self.count_extractions(None)?;
        let pending = self.count_extractions(Some(ExtractionStatus::Pending))?;
        let complete = self.count_extractions(Some(ExtractionStatus::Complete))?;

        let conn = self.conn.lock();
        let (corrections, embedded_documents, embeddings_stored, dim): (i64, i64, i64, Option<i64>) = conn
            .query_row(
                "SELECT
                    (SELECT COUNT(*) FROM corrections),
                    (SELECT COUNT(DISTINCT document_id) FROM chunk_embeddings),
                    (SELECT COUNT(*) FROM chunk_embeddings),
                    (SELECT MAX(dim) FROM chunk_embeddings)",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        drop(conn);

        let db_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            total_extractions: total,
            pending_extractions: pending,
            complete_extractions: complete,
            corrections,
            embedded_documents,
            embeddings_stored,
            embedding_dimension: dim.unwrap_or(0) as usize,
            db_path: self.db_path.to_string_lossy().to_string(),
            db_size_mb: db_size as f64 / (1024.0 * 1024.0),
        })
    }

    // ---------------------------------------------------------------
    // Row Mapping Helpers
    // ---------------------------------------------------------------

    fn row_to_extraction(row: &rusqlite::Row<'_>) -> Extraction {
        let status: String = row.get("status").unwrap_or_default();
        Extraction {
            document_id: row.get("document_id").unwrap_or_default(),
            file_name: row.get("file_name").unwrap_or_default(),
            status: status.parse().unwrap_or(ExtractionStatus::Pending),
            raw: parse_json_column(&row.get::<_, String>("raw_json").unwrap_or_default()),
            final_data: parse_json_column(&row.get::<_, String>("final_json").unwrap_or_default()),
            meta: parse_json_column(&row.get::<_, String>("meta_json").unwrap_or_default()),
            corrections: Vec::new(),
            created_at: row.get("created_at").unwrap_or_default(),
            updated_at: row.get("updated_at").unwrap_or_default(),
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn parse_json_column(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn row(compte: &str, solde: &str) -> serde_json::Value {
        json!({
            "compte": [compte, "3"],
            "solde_an": [null, null],
            "solde": [solde, "4"],
            "débit": [0, null],
            "crédit": [0, null]
        })
    }

    #[test]
    fn test_placeholder_then_complete() {
        let (store, _dir) = test_store();
        store.insert_placeholder("abc", "releve.pdf").unwrap();

        let pending = store.get_extraction("abc").unwrap().unwrap();
        assert_eq!(pending.status, ExtractionStatus::Pending);
        assert_eq!(pending.file_name, "releve.pdf");
        assert_eq!(pending.raw, json!([]));
        assert!(store.final_rows("abc").unwrap().is_none());

        let raw = json!([{"id": "1", "text": "401000"}]);
        let final_data = json!([row("401000", "1 234,56")]);
        store.complete_extraction("abc", &raw, &final_data).unwrap();

        let done = store.get_extraction("abc").unwrap().unwrap();
        assert!(done.is_complete());
        assert_eq!(done.raw, raw);
        assert_eq!(store.final_rows("abc").unwrap().unwrap(), vec![row("401000", "1 234,56")]);
    }

    #[test]
    fn test_pending_placeholder_is_upserted() {
        let (store, _dir) = test_store();
        store.insert_placeholder("abc", "old.pdf").unwrap();
        store.insert_placeholder("abc", "new.pdf").unwrap();
        assert_eq!(store.get_extraction("abc").unwrap().unwrap().file_name, "new.pdf");
        assert_eq!(store.count_extractions(None).unwrap(), 1);

        store.complete_extraction("abc", &json!([]), &json!([])).unwrap();
        assert!(matches!(
            store.insert_placeholder("abc", "again.pdf"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_complete_unknown_is_not_found() {
        let (store, _dir) = test_store();
        assert!(matches!(
            store.complete_extraction("missing", &json!([]), &json!([])),
            Err(Error::NotFound(_))
        ));
        assert!(store.get_extraction("missing").unwrap().is_none());
        assert!(store.final_rows("missing").unwrap().is_none());
    }

    #[test]
    fn test_corrections_keep_history() {
        let (store, _dir) = test_store();
        store.insert_placeholder("abc", "releve.pdf").unwrap();
        let v0 = json!([row("401000", "10,00")]);
        store.complete_extraction("abc", &json!([]), &v0).unwrap();

        let v1 = json!([row("401000", "12,00")]);
        let updated = store
            .update_extraction_with_correction("abc", &v1)
            .unwrap()
            .unwrap();
        assert_eq!(updated.final_data, v1);
        assert_eq!(updated.corrections.len(), 1);
        assert_eq!(updated.corrections[0].version, 1);
        assert_eq!(updated.corrections[0].final_data, v0);
        assert!(chrono::DateTime::parse_from_rfc3339(&updated.corrections[0].timestamp).is_ok());

        let v2 = json!([]);
        let updated = store
            .update_extraction_with_correction("abc", &v2)
            .unwrap()
            .unwrap();
        let versions: Vec<i64> = updated.corrections.iter().map(|c| c.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(updated.corrections[1].final_data, v1);
        assert_eq!(store.final_rows("abc").unwrap().unwrap(), Vec::<serde_json::Value>::new());
    }

    #[test]
    fn test_correct_unknown_returns_none() {
        let (store, _dir) = test_store();
        assert!(store
            .update_extraction_with_correction("missing", &json!([]))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_non_array_final_data_has_no_rows() {
        let (store, _dir) = test_store();
        store.insert_placeholder("abc", "a.pdf").unwrap();
        store
            .complete_extraction("abc", &json!([]), &json!({"note": "no rows"}))
            .unwrap();
        assert!(store.final_rows("abc").unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_embeddings_replace_and_keep_order() {
        let (store, _dir) = test_store();
        let chunks = vec!["a | b".to_string(), "c | d".to_string()];
        store
            .store_embeddings("docA", &chunks, &[array![1.0, 0.0], array![0.0, 1.0]])
            .unwrap();
        store
            .store_embeddings("docB", &chunks[..1], &[array![0.5, 0.5]])
            .unwrap();

        let all = store.all_embeddings().unwrap();
        let ids: Vec<&str> = all.iter().map(|e| e.document_id.as_str()).collect();
        assert_eq!(ids, vec!["docA", "docA", "docB"]);
        assert_eq!(all[1].embedding, array![0.0f32, 1.0]);
        assert_eq!(all[1].chunk_index, 1);
        assert_eq!(all[1].text, "c | d");

        store
            .store_embeddings("docA", &chunks[..1], &[array![0.25, 0.75]])
            .unwrap();
        let all = store.all_embeddings().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].document_id, "docB");
        assert_eq!(all[1].embedding, array![0.25f32, 0.75]);
    }

    #[test]
    fn test_embedding_count_mismatch() {
        let (store, _dir) = test_store();
        let err = store
            .store_embeddings("docA", &["x".to_string()], &[])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(store.all_embeddings().unwrap().is_empty());
    }

    #[test]
    fn test_stats() {
        let (store, _dir) = test_store();
        store.insert_placeholder("a", "a.pdf").unwrap();
        store.insert_placeholder("b", "b.pdf").unwrap();
        store.complete_extraction("b", &json!([]), &json!([])).unwrap();
        store.update_extraction_with_correction("b", &json!([])).unwrap();
        store
            .store_embeddings("b", &["x".to_string()], &[array![1.0, 2.0, 3.0]])
            .unwrap();

        let stats = store.get_stats().unwrap();
        assert_eq!(stats.total_extractions, 2);
        assert_eq!(stats.pending_extractions, 1);
        assert_eq!(stats.complete_extractions, 1);
        assert_eq!(stats.corrections, 1);
        assert_eq!(stats.embedded_documents, 1);
        assert_eq!(stats.embeddings_stored, 1);
        assert_eq!(stats.embedding_dimension, 3);
        assert!(stats.db_path.ends_with(DB_FILE_NAME));
    }

    #[test]
    fn test_reopen_persists() {
        let dir = TempDir::new().unwrap();
        {
            let store = SqliteStore::open(dir.path()).unwrap();
            store.insert_placeholder("abc", "a.pdf").unwrap();
        }
        let store = SqliteStore::open(dir.path()).unwrap();
        assert!(store.get_extraction("abc").unwrap().is_some());
    }
}
