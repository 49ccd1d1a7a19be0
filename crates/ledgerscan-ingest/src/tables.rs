//! Table detection over positioned words, and row normalisation.
//!
//! Tables are found from layout alone: a line whose words fall into two or
//! more column-separated cells is a candidate row, and a run of such rows is
//! a table. A single-cell line sitting under one of the previous row's cells
//! continues that cell on a new line, which is how wrapped labels show up.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::words::Word;

/// A table found on one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTable {
    pub page: usize,
    /// Position of the table on its page, from the top.
    pub table_index: usize,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct TableOptions {
    /// Maximum `top` difference between words of one line.
    pub line_tolerance: i64,
    /// Horizontal gap that separates two cells.
    pub column_gap: i64,
    pub min_rows: usize,
    pub min_columns: usize,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            line_tolerance: 3,
            column_gap: 15,
            min_rows: 2,
            min_columns: 2,
        }
    }
}

#[derive(Debug, Clone)]
struct Cell {
    text: String,
    x0: i64,
    x1: i64,
}

/// Detect tables on every page.
pub fn extract_tables(pages: &[Vec<Word>], opts: &TableOptions) -> Vec<PageTable> {
    let tables: Vec<PageTable> = pages
        .iter()
        .enumerate()
        .flat_map(|(page, words)| extract_page_tables(words, page, opts))
        .collect();
    debug!("Detected {} tables over {} pages", tables.len(), pages.len());
    tables
}

pub fn extract_page_tables(words: &[Word], page: usize, opts: &TableOptions) -> Vec<PageTable> {
    let mut tables = Vec::new();
    let mut current: Vec<Vec<Cell>> = Vec::new();

    let finish = |current: &mut Vec<Vec<Cell>>, tables: &mut Vec<PageTable>| {
        if current.len() >= opts.min_rows {
            tables.push(PageTable {
                page,
                table_index: tables.len(),
                rows: current
                    .drain(..)
                    .map(|row| row.into_iter().map(|c| c.text).collect())
                    .collect(),
            });
        }
        current.clear();
    };

    for line in group_lines(words, opts.line_tolerance) {
        let cells = split_cells(&line, opts.column_gap);
        if cells.len() >= opts.min_columns {
            current.push(cells);
            continue;
        }
        if let ([cell], Some(prev)) = (cells.as_slice(), current.last_mut()) {
            if let Some(target) = prev.iter_mut().find(|c| cell.x0 >= c.x0 && cell.x0 <= c.x1) {
                target.text.push('\n');
                target.text.push_str(&cell.text);
                continue;
            }
        }
        finish(&mut current, &mut tables);
    }
    finish(&mut current, &mut tables);

    tables
}

fn group_lines(words: &[Word], tolerance: i64) -> Vec<Vec<&Word>> {
    let mut sorted: Vec<&Word> = words.iter().collect();
    sorted.sort_by_key(|w| w.top);

    let mut lines: Vec<Vec<&Word>> = Vec::new();
    for word in sorted {
        match lines.last_mut() {
            Some(line) if word.top - line[0].top <= tolerance => line.push(word),
            _ => lines.push(vec![word]),
        }
    }
    for line in &mut lines {
        line.sort_by_key(|w| w.x0);
    }
    lines
}

fn split_cells(line: &[&Word], column_gap: i64) -> Vec<Cell> {
    let mut cells: Vec<Cell> = Vec::new();
    for word in line {
        match cells.last_mut() {
            Some(cell) if word.x0 - cell.x1 <= column_gap => {
                cell.text.push(' ');
                cell.text.push_str(&word.text);
                cell.x1 = cell.x1.max(word.x1);
            }
            _ => cells.push(Cell {
                text: word.text.clone(),
                x0: word.x0,
                x1: word.x1,
            }),
        }
    }
    cells
}

/// Expand cells holding several lines into one row per line.
///
/// Every produced row keeps the source column count; columns with fewer
/// lines than the tallest cell are padded with empty strings.
pub fn normalize_table_rows(rows: &[Vec<String>]) -> Vec<Vec<String>> {
    let mut normalized = Vec::new();
    for row in rows {
        let split: Vec<Vec<&str>> = row.iter().map(|cell| cell.split('\n').collect()).collect();
        let height = split.iter().map(Vec::len).max().unwrap_or(0);
        for i in 0..height {
            normalized.push(
                split
                    .iter()
                    .map(|lines| lines.get(i).copied().unwrap_or("").to_string())
                    .collect(),
            );
        }
    }
    normalized
}
