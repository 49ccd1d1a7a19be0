//! LedgerScan Ingest: PDF word extraction, numeric token merging, table
//! detection, row chunking and page rendering.

pub mod chunking;
pub mod cmap;
pub mod ingest;
pub mod pdf;
pub mod render;
pub mod tables;
pub mod tokens;
pub mod words;

pub use chunking::{chunk_tables, create_chunks, RecursiveSplitter};
pub use ingest::{content_hash, extract_pdf_tables, save_tokens, ExtractedDocument, PdfIngester};
pub use pdf::PdfDocument;
pub use render::{image_name, PageRasterizer, PageRenderer};
pub use tables::{extract_tables, normalize_table_rows, PageTable, TableOptions};
pub use tokens::{extract_tokens, merge_page_words, raw_tokens, tokenize_pages, RawToken, Token, DEFAULT_MAX_GAP};
pub use words::{group_chars_into_words, PositionedChar, Word, WordOptions};
