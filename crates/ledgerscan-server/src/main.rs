//! LedgerScan: accounting-PDF extraction server.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use ledgerscan_core::LedgerScanConfig;
use ledgerscan_ingest::{create_chunks, PdfIngester};
use ledgerscan_llm::LLMConfig;
use ledgerscan_server::{build_router, AppState};
use ledgerscan_store::SqliteStore;

fn resolve_data_dir() -> PathBuf {
    std::env::var("LEDGERSCAN_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn print_help() {
    println!("LedgerScan: accounting PDF extraction server");
    println!();
    println!("Usage: ledgerscan [command]");
    println!();
    println!("Commands:");
    println!("  (none) | serve           Start the server");
    println!("  tokens <pdf>             Print merged tokens as JSON");
    println!("  chunks <pdf>             Print table chunks, one per line");
    println!("  help                     Show this help message");
}

/// `ledgerscan tokens <pdf>`
fn print_tokens(pdf: &Path, max_gap: i64) -> anyhow::Result<()> {
    let extracted = PdfIngester::new(max_gap).extract_file(pdf)?;
    println!("{}", serde_json::to_string_pretty(&extracted.tokens)?);
    Ok(())
}

/// `ledgerscan chunks <pdf>`
fn print_chunks(pdf: &Path, config: &LedgerScanConfig) -> anyhow::Result<()> {
    let extracted = PdfIngester::new(config.max_gap).extract_file(pdf)?;
    let settings = &config.retrieval;
    for chunk in create_chunks(&extracted.tables, settings.chunk_size, settings.chunk_overlap)? {
        println!("{}", chunk);
    }
    Ok(())
}

fn pdf_argument(args: &[String], command: &str) -> PathBuf {
    match args.get(2) {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("Usage: ledgerscan {} <pdf>", command);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let data_dir = resolve_data_dir();

    if args.len() > 1 {
        match args[1].as_str() {
            "serve" => {}
            "tokens" => {
                let pdf = pdf_argument(&args, "tokens");
                let config = LedgerScanConfig::from_env(&data_dir)?;
                return print_tokens(&pdf, config.max_gap);
            }
            "chunks" => {
                let pdf = pdf_argument(&args, "chunks");
                let config = LedgerScanConfig::from_env(&data_dir)?;
                return print_chunks(&pdf, &config);
            }
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'ledgerscan help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    info!("Data directory: {}", data_dir.display());

    let config = LedgerScanConfig::from_env(&data_dir)?;
    let port = config.port;

    let store = SqliteStore::open(&config.data_paths.db)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;

    let llm_config = LLMConfig::load(&config.data_paths.llm_config_file);

    // Both backends wrap blocking HTTP clients, which must not be built on
    // an async worker thread.
    let (embedder, llm) = {
        let api_key = llm_config.openai_api_key.clone();
        let model = config.embedding_model.clone();
        let dim = config.embedding_dim;
        let llm_config = llm_config.clone();
        tokio::task::spawn_blocking(move || {
            (
                ledgerscan_infer::create_embedder(api_key.as_deref(), &model, dim),
                ledgerscan_llm::create_backend(&llm_config),
            )
        })
        .await?
    };

    let state = Arc::new(AppState::new(config, store, embedder, llm_config, llm));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("LedgerScan server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
