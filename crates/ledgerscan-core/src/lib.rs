//! LedgerScan Core: error type, configuration, data directories.

pub mod config;
pub mod error;

pub use config::{DataPaths, ImageFormat, LedgerScanConfig, RetrievalSettings};
pub use error::{Error, Result};
