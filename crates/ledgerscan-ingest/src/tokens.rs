//! Token extraction and numeric reassembly.
//!
//! PDF text extraction often splits one printed amount (`1 234,56`) into
//! several words. The merger walks a page's words left to right and glues a
//! leading 1-3 digit group to the adjacent thousands groups and decimal tail
//! that follow it, committing the merge only when the joined text is a valid
//! grouped decimal. Token ids are assigned from a counter threaded across
//! pages, so ids are 1..=n over the whole document.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::pdf::PdfDocument;
use crate::words::{Word, WordOptions};
use ledgerscan_core::Result;

/// Horizontal gap below which two number fragments are considered adjacent.
pub const DEFAULT_MAX_GAP: i64 = 10;
/// Maximum `top` difference for two fragments to sit on the same line.
const LINE_TOLERANCE: i64 = 3;

/// An identified unit of extracted text with its bounding box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: u64,
    pub text: String,
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
    pub page: usize,
}

/// `{id, text}` pair as persisted in the extraction record's raw data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawToken {
    pub id: String,
    pub text: String,
}

impl From<&Token> for RawToken {
    fn from(token: &Token) -> Self {
        Self {
            id: token.id.to_string(),
            text: token.text.clone(),
        }
    }
}

enum MergeState {
    Scanning,
    /// Collecting fragments of a number that started at `start`; `last` is
    /// the most recently consumed word and `text` the joined candidate.
    ExtendingNumber { start: usize, last: usize, text: String },
}

/// Merge one page's words into tokens, numbering them from `first_id`.
///
/// The next unused id is `first_id + tokens.len()`.
pub fn merge_page_words(words: &[Word], page: usize, first_id: u64, max_gap: i64) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(words.len());
    let mut next_id = first_id;
    let mut emit = |tokens: &mut Vec<Token>, text: String, first: &Word, last: &Word| {
        tokens.push(Token {
            id: next_id,
            text,
            x0: first.x0,
            y0: first.top,
            x1: last.x1,
            y1: last.bottom,
            page,
        });
        next_id += 1;
    };

    let mut state = MergeState::Scanning;
    let mut i = 0;
    loop {
        state = match state {
            MergeState::Scanning => {
                let Some(word) = words.get(i) else {
                    break;
                };
                i += 1;
                if is_number_lead(&word.text) {
                    MergeState::ExtendingNumber {
                        start: i - 1,
                        last: i - 1,
                        text: word.text.clone(),
                    }
                } else {
                    emit(&mut tokens, word.text.clone(), word, word);
                    MergeState::Scanning
                }
            }
            MergeState::ExtendingNumber { start, last, mut text } => match words.get(i) {
                Some(next) if is_adjacent(&words[last], next, max_gap) && extends_number(&next.text) => {
                    if !is_detached_fraction(&next.text) {
                        text.push(' ');
                    }
                    text.push_str(&next.text);
                    i += 1;
                    MergeState::ExtendingNumber { start, last: i - 1, text }
                }
                _ => {
                    if last > start && is_grouped_decimal(&text) {
                        debug!("Merged {} words into {:?}", last - start + 1, text);
                        emit(&mut tokens, text, &words[start], &words[last]);
                    } else {
                        // No partial merges: the lead stands alone and the
                        // lookahead words are scanned again.
                        let lead = &words[start];
                        emit(&mut tokens, lead.text.clone(), lead, lead);
                        i = start + 1;
                    }
                    MergeState::Scanning
                }
            },
        };
    }

    tokens
}

/// Merge every page in order, threading the id counter from 1.
pub fn tokenize_pages(pages: &[Vec<Word>], max_gap: i64) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut next_id = 1u64;
    for (page, words) in pages.iter().enumerate() {
        let page_tokens = merge_page_words(words, page, next_id, max_gap);
        next_id += page_tokens.len() as u64;
        tokens.extend(page_tokens);
    }
    tokens
}

/// Extract merged tokens from a PDF file, scanning pages 0..N-1.
pub fn extract_tokens(path: impl AsRef<Path>, max_gap: i64) -> Result<Vec<Token>> {
    let path = path.as_ref();
    let doc = PdfDocument::open(path)?;
    let pages = doc.extract_page_words(&WordOptions::default())?;
    let tokens = tokenize_pages(&pages, max_gap);
    info!(
        "Extracted {} tokens from {} pages of {}",
        tokens.len(),
        pages.len(),
        path.display()
    );
    Ok(tokens)
}

/// `{id, text}` pairs in token order.
pub fn raw_tokens(tokens: &[Token]) -> Vec<RawToken> {
    tokens.iter().map(RawToken::from).collect()
}

fn is_adjacent(prev: &Word, next: &Word, max_gap: i64) -> bool {
    next.x0 - prev.x1 < max_gap && (next.top - prev.top).abs() < LINE_TOLERANCE
}

fn extends_number(text: &str) -> bool {
    is_thousands_group(text) || is_decimal_tail(text) || is_detached_fraction(text)
}

fn is_digits(s: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

/// `-?\d{1,3}`
fn is_number_lead(text: &str) -> bool {
    is_digits(text.strip_prefix('-').unwrap_or(text), 1, 3)
}

/// `\d{3}`
fn is_thousands_group(text: &str) -> bool {
    is_digits(text, 3, 3)
}

/// `\d{1,3}[,.]\d{1,2}-?`
fn is_decimal_tail(text: &str) -> bool {
    let body = text.strip_suffix('-').unwrap_or(text);
    match body.find([',', '.']) {
        Some(pos) => is_digits(&body[..pos], 1, 3) && is_digits(&body[pos + 1..], 1, 2),
        None => false,
    }
}

/// `[,.]\d{1,2}-?`, a decimal part extracted on its own.
fn is_detached_fraction(text: &str) -> bool {
    let body = text.strip_suffix('-').unwrap_or(text);
    body.strip_prefix([',', '.'])
        .is_some_and(|digits| is_digits(digits, 1, 2))
}

/// `-?\d{1,3}( \d{3})*[,.]\d{1,2}-?`
pub fn is_grouped_decimal(text: &str) -> bool {
    let body = text.strip_prefix('-').unwrap_or(text);
    let body = body.strip_suffix('-').unwrap_or(body);
    let Some(pos) = body.rfind([',', '.']) else {
        return false;
    };
    if !is_digits(&body[pos + 1..], 1, 2) {
        return false;
    }
    let mut groups = body[..pos].split(' ');
    groups.next().is_some_and(|lead| is_digits(lead, 1, 3)) && groups.all(is_thousands_group)
}
