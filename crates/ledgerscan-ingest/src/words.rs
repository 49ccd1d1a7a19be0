//! Positioned characters and their grouping into words.
//!
//! Coordinates use a top-left origin: `top` grows downwards from the top
//! edge of the page's MediaBox. Words carry integer coordinates, truncated
//! towards zero from the floating point glyph boxes.

use serde::{Deserialize, Serialize};

/// A single glyph placed on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedChar {
    pub ch: char,
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
}

/// A single lexical unit from page extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub x0: i64,
    pub top: i64,
    pub x1: i64,
    pub bottom: i64,
    pub page: usize,
}

impl Word {
    pub fn new(text: impl Into<String>, x0: i64, top: i64, x1: i64, bottom: i64, page: usize) -> Self {
        Self {
            text: text.into(),
            x0,
            top,
            x1,
            bottom,
            page,
        }
    }
}

/// Tolerances used when grouping characters into words.
#[derive(Debug, Clone)]
pub struct WordOptions {
    /// Maximum horizontal gap between two glyphs of the same word.
    pub x_tolerance: f64,
    /// Maximum vertical offset between two glyphs of the same line.
    pub y_tolerance: f64,
}

impl Default for WordOptions {
    fn default() -> Self {
        Self {
            x_tolerance: 3.0,
            y_tolerance: 3.0,
        }
    }
}

/// Group page characters into words, ordered top-to-bottom then left-to-right.
///
/// Characters are first clustered into lines by their `top` coordinate,
/// each line is sorted by `x0`, then a word boundary is placed on any
/// whitespace glyph or whenever the next glyph is too far from the previous one.
pub fn group_chars_into_words(chars: &[PositionedChar], page: usize, opts: &WordOptions) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Vec<&PositionedChar> = Vec::new();

    for line in cluster_lines(chars, opts.y_tolerance) {
        for ch in line {
            if ch.ch.is_whitespace() {
                flush_word(&mut current, page, &mut words);
                continue;
            }
            if let Some(prev) = current.last() {
                if begins_new_word(prev, ch, opts) {
                    flush_word(&mut current, page, &mut words);
                }
            }
            current.push(ch);
        }
        flush_word(&mut current, page, &mut words);
    }

    words
}

fn begins_new_word(prev: &PositionedChar, next: &PositionedChar, opts: &WordOptions) -> bool {
    next.x0 > prev.x1 + opts.x_tolerance
        || next.x1 < prev.x0 - opts.x_tolerance
        || (next.top - prev.top).abs() > opts.y_tolerance
}

fn flush_word(current: &mut Vec<&PositionedChar>, page: usize, words: &mut Vec<Word>) {
    if current.is_empty() {
        return;
    }
    let text: String = current.iter().map(|c| c.ch).collect();
    let x0 = current.iter().map(|c| c.x0).fold(f64::INFINITY, f64::min);
    let top = current.iter().map(|c| c.top).fold(f64::INFINITY, f64::min);
    let x1 = current.iter().map(|c| c.x1).fold(f64::NEG_INFINITY, f64::max);
    let bottom = current.iter().map(|c| c.bottom).fold(f64::NEG_INFINITY, f64::max);
    words.push(Word::new(
        text,
        x0.trunc() as i64,
        top.trunc() as i64,
        x1.trunc() as i64,
        bottom.trunc() as i64,
        page,
    ));
    current.clear();
}

/// Cluster characters into lines: a new line starts whenever the sorted
/// `top` values jump by more than `tolerance`.
fn cluster_lines(chars: &[PositionedChar], tolerance: f64) -> Vec<Vec<&PositionedChar>> {
    let mut sorted: Vec<&PositionedChar> = chars.iter().collect();
    sorted.sort_by(|a, b| a.top.total_cmp(&b.top));

    let mut lines: Vec<Vec<&PositionedChar>> = Vec::new();
    let mut last_top = f64::NEG_INFINITY;
    for ch in sorted {
        let starts_line = lines.is_empty() || ch.top - last_top > tolerance;
        if starts_line {
            lines.push(vec![ch]);
        } else if let Some(line) = lines.last_mut() {
            line.push(ch);
        }
        last_top = ch.top;
    }

    for line in &mut lines {
        line.sort_by(|a, b| a.x0.total_cmp(&b.x0));
    }
    lines
}
