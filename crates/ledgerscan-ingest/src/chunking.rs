//! Table row chunking for embeddings.
//!
//! Each normalised table row is rendered as `cell | cell | cell` and split
//! with a recursive character splitter: the text is cut on the first
//! separator of `["\n\n", "\n", " ", ""]` it contains, separators stay
//! attached to the start of the following piece, pieces shorter than the
//! chunk size are packed greedily, and longer ones are split again with the
//! remaining separators. After a chunk is emitted, whole leading pieces are
//! dropped until at most `chunk_overlap` characters remain, so the overlap
//! between neighbours is made of complete words (or characters, once the
//! splitter has fallen back to per-character pieces). Lengths are counted
//! in characters and chunks are whitespace-trimmed.

use std::collections::VecDeque;

use tracing::warn;

use crate::tables::{normalize_table_rows, PageTable};
use ledgerscan_core::{Error, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 200;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
/// Delimiter placed between the cells of a row.
pub const CELL_DELIMITER: &str = " | ";

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Recursive character splitter with bounded chunk size and overlap.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidInput("chunk size must be positive".into()));
        }
        if chunk_overlap > chunk_size {
            return Err(Error::InvalidInput(format!(
                "chunk overlap ({}) larger than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut good: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                chunks.extend(self.merge_pieces(&good));
                good.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }
        if !good.is_empty() {
            chunks.extend(self.merge_pieces(&good));
        }
        chunks
    }

    /// Pack small pieces into chunks, carrying an overlap tail forward.
    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }
                if !current.is_empty() {
                    chunks.extend(join_pieces(&current));
                    while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                        match current.pop_front() {
                            Some(front) => total -= char_len(front),
                            None => break,
                        }
                    }
                }
            }
            current.push_back(piece);
            total += len;
        }
        chunks.extend(join_pieces(&current));
        chunks
    }
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Chunk the rows of every table, in table, row, line and split order.
///
/// No chunk spans two rows.
pub fn create_chunks(tables: &[PageTable], chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    let splitter = RecursiveSplitter::new(chunk_size, chunk_overlap)?;
    Ok(chunk_tables(tables, &splitter))
}

pub fn chunk_tables(tables: &[PageTable], splitter: &RecursiveSplitter) -> Vec<String> {
    let mut chunks = Vec::new();
    for table in tables {
        for row in normalize_table_rows(&table.rows) {
            chunks.extend(splitter.split_text(&row.join(CELL_DELIMITER)));
        }
    }
    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on `separator`, keeping each separator at the start of the piece
/// that follows it. Empty pieces are dropped; an empty separator splits into
/// characters.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        pieces.push(&text[start..idx]);
        start = idx;
    }
    pieces.push(&text[start..]);
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn join_pieces(pieces: &VecDeque<&str>) -> Option<String> {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
