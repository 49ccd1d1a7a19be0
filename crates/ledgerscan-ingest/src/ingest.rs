//! Document ingestion: PDF → words → merged tokens and tables.

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::pdf::PdfDocument;
use crate::tables::{extract_tables, PageTable, TableOptions};
use crate::tokens::{tokenize_pages, Token, DEFAULT_MAX_GAP};
use crate::words::WordOptions;
use ledgerscan_core::Result;

/// Everything extracted from one PDF in a single pass over its pages.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub tokens: Vec<Token>,
    pub tables: Vec<PageTable>,
    pub page_count: usize,
}

/// Extracts tokens and tables from PDFs.
#[derive(Debug, Clone)]
pub struct PdfIngester {
    max_gap: i64,
    word_options: WordOptions,
    table_options: TableOptions,
}

impl PdfIngester {
    pub fn new(max_gap: i64) -> Self {
        Self {
            max_gap,
            word_options: WordOptions::default(),
            table_options: TableOptions::default(),
        }
    }

    pub fn with_table_options(mut self, table_options: TableOptions) -> Self {
        self.table_options = table_options;
        self
    }

    pub fn extract_file(&self, path: &Path) -> Result<ExtractedDocument> {
        let doc = PdfDocument::open(path)?;
        let extracted = self.extract(&doc)?;
        info!(
            "Extracted {} tokens and {} tables from {} ({} pages)",
            extracted.tokens.len(),
            extracted.tables.len(),
            path.display(),
            extracted.page_count
        );
        Ok(extracted)
    }

    pub fn extract_bytes(&self, bytes: &[u8]) -> Result<ExtractedDocument> {
        self.extract(&PdfDocument::from_bytes(bytes)?)
    }

    fn extract(&self, doc: &PdfDocument) -> Result<ExtractedDocument> {
        let pages = doc.extract_page_words(&self.word_options)?;
        let words: usize = pages.iter().map(Vec::len).sum();
        debug!("{} words over {} pages", words, pages.len());

        Ok(ExtractedDocument {
            tokens: tokenize_pages(&pages, self.max_gap),
            tables: extract_tables(&pages, &self.table_options),
            page_count: pages.len(),
        })
    }
}

impl Default for PdfIngester {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_GAP)
    }
}

/// Tables of a PDF file, for callers that do not need tokens.
pub fn extract_pdf_tables(path: &Path) -> Result<Vec<PageTable>> {
    let doc = PdfDocument::open(path)?;
    let pages = doc.extract_page_words(&WordOptions::default())?;
    Ok(extract_tables(&pages, &TableOptions::default()))
}

/// Write tokens with their boxes as pretty-printed JSON.
pub fn save_tokens(tokens: &[Token], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), tokens)?;
    debug!("Saved {} tokens to {}", tokens.len(), path.display());
    Ok(())
}

/// Compute SHA-256 content hash, used as the document id.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_known_value() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(content_hash(b"").len(), 64);
    }

    #[test]
    fn test_save_tokens_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("releve.json");
        let tokens = vec![Token {
            id: 1,
            text: "1 234,56".into(),
            x0: 10,
            y0: 20,
            x1: 60,
            y1: 30,
            page: 0,
        }];
        save_tokens(&tokens, &path).unwrap();

        let back: Vec<Token> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, tokens);
    }

    #[test]
    fn test_extract_bytes_rejects_garbage() {
        assert!(PdfIngester::default().extract_bytes(b"%PDF-garbage").is_err());
    }
}
