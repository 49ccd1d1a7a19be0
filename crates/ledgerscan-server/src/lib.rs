//! LedgerScan server: HTTP surface and extraction pipeline.

pub mod pipeline;
pub mod routes;
pub mod state;

pub use pipeline::{run_extraction, ExtractionOutcome, PipelineError, Upload};
pub use routes::build_router;
pub use state::AppState;
