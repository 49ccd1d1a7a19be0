//! Few-shot example selection from previously validated extractions.

use tracing::{debug, warn};

use ledgerscan_core::Result;
use ledgerscan_store::SqliteStore;

/// Source of finalized extraction rows.
pub trait ExtractionSource {
    /// Final rows of a complete extraction; `None` when missing or pending.
    fn final_rows(&self, document_id: &str) -> Result<Option<Vec<serde_json::Value>>>;
}

impl ExtractionSource for SqliteStore {
    fn final_rows(&self, document_id: &str) -> Result<Option<Vec<serde_json::Value>>> {
        SqliteStore::final_rows(self, document_id)
    }
}

/// Take the first `per_doc` rows of each document, in ranked order, and cap
/// the total at `cap`.
///
/// Documents that are missing, still pending or fail to load contribute no
/// rows; selection itself never fails.
pub fn select_examples<S: ExtractionSource + ?Sized>(
    source: &S,
    document_ids: &[String],
    per_doc: usize,
    cap: usize,
) -> Vec<serde_json::Value> {
    let mut examples = Vec::new();
    for document_id in document_ids {
        if examples.len() >= cap {
            break;
        }
        match source.final_rows(document_id) {
            Ok(Some(rows)) => {
                examples.extend(rows.into_iter().take(per_doc));
            }
            Ok(None) => debug!("No finalized extraction for {}", document_id),
            Err(e) => warn!("Could not load examples from {}: {}", document_id, e),
        }
    }
    examples.truncate(cap);
    debug!("Selected {} examples from {} documents", examples.len(), document_ids.len());
    examples
}
