//! LedgerScan Retrieval: finds past documents that look like the one being
//! extracted and turns their validated rows into few-shot examples.

pub mod examples;
pub mod similarity;

pub use examples::{select_examples, ExtractionSource};
pub use similarity::{cosine_similarity, rank_similar_documents, CorpusVector};
