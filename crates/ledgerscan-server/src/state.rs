//! Shared application state.

use std::sync::Arc;

use ledgerscan_core::LedgerScanConfig;
use ledgerscan_infer::EmbedderBackend;
use ledgerscan_ingest::{PageRasterizer, PageRenderer, PdfIngester};
use ledgerscan_llm::{CompletionBackend, LLMConfig};
use ledgerscan_store::SqliteStore;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: LedgerScanConfig,
    pub store: SqliteStore,
    pub embedder: Arc<dyn EmbedderBackend>,
    pub llm_config: LLMConfig,
    pub llm: Arc<dyn CompletionBackend>,
    pub ingester: PdfIngester,
    pub renderer: Arc<dyn PageRasterizer>,
}

impl AppState {
    pub fn new(
        config: LedgerScanConfig,
        store: SqliteStore,
        embedder: Arc<dyn EmbedderBackend>,
        llm_config: LLMConfig,
        llm: Arc<dyn CompletionBackend>,
    ) -> Self {
        let ingester = PdfIngester::new(config.max_gap);
        let renderer = Arc::new(PageRenderer::new(config.render_dpi, config.image_format));
        Self {
            config,
            store,
            embedder,
            llm_config,
            llm,
            ingester,
            renderer,
        }
    }

    /// Replace the page renderer (e.g. a different poppler install).
    pub fn with_renderer(mut self, renderer: Arc<dyn PageRasterizer>) -> Self {
        self.renderer = renderer;
        self
    }
}
