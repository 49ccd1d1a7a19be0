//! HTTP tests driving the router directly with `oneshot`.
//!
//! Rendering, embeddings and the chat model are replaced with in-process
//! fakes so the full extraction flow runs offline.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use ndarray::Array1;
use tower::ServiceExt;

use ledgerscan_core::{Error, LedgerScanConfig, Result};
use ledgerscan_infer::{EmbedderBackend, EmbeddingResult};
use ledgerscan_ingest::{content_hash, image_name, PageRasterizer};
use ledgerscan_llm::{ChatMessage, CompletionBackend, LLMConfig};
use ledgerscan_server::{build_router, AppState};
use ledgerscan_store::SqliteStore;

const BOUNDARY: &str = "ledgerscan-test-boundary";

const MODEL_REPLY: &str = "```json
[{\"compte\": [\"401000\", \"3\"], \"solde_an\": [null, null], \"solde\": [\"1 234,56\", \"4\"], \"débit\": [0, null], \"crédit\": [0, null]}]
```";

/// Writes an empty file per page instead of running poppler.
struct FakeRenderer {
    pages: u32,
    fail: bool,
}

impl PageRasterizer for FakeRenderer {
    fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        if self.fail {
            return Err(Error::Render("pdftoppm not found on PATH".into()));
        }
        let stem = pdf_path.file_stem().and_then(|s| s.to_str()).unwrap_or("doc");
        (1..=self.pages)
            .map(|n| -> Result<PathBuf> {
                let path = out_dir.join(image_name(stem, n, "jpg"));
                std::fs::write(&path, b"jpg")?;
                Ok(path)
            })
            .collect()
    }
}

/// Every text maps to a vector close to every other one.
///
/// From batch number `extra_vector_from` on (1-based), one vector more than
/// requested is returned, which the store refuses to save.
#[derive(Default)]
struct FakeEmbedder {
    batches: AtomicUsize,
    extra_vector_from: Option<usize>,
}

impl EmbedderBackend for FakeEmbedder {
    fn embed(&self, text: &str) -> Result<EmbeddingResult> {
        Ok(EmbeddingResult {
            embedding: Array1::from(vec![1.0, text.len() as f32 / 100.0]),
            cached: false,
        })
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Array1<f32>>> {
        let batch = self.batches.fetch_add(1, Ordering::SeqCst) + 1;
        let mut vectors = texts
            .iter()
            .map(|t| self.embed(t).map(|r| r.embedding))
            .collect::<Result<Vec<_>>>()?;
        if self.extra_vector_from.is_some_and(|from| batch >= from) {
            vectors.push(Array1::from(vec![1.0, 0.0]));
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        2
    }

    fn is_available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        "fake-embedder"
    }
}

#[derive(Default)]
struct FakeLlm {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

impl CompletionBackend for FakeLlm {
    fn complete(&self, messages: &[ChatMessage], _temperature: f64) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(messages[1].content.clone());
        if self.fail {
            return Err(Error::Llm("API error 503".into()));
        }
        Ok(MODEL_REPLY.to_string())
    }

    fn model_name(&self) -> &str {
        "fake-llm"
    }
}

struct TestApp {
    router: Router,
    llm: Arc<FakeLlm>,
    data_dir: tempfile::TempDir,
}

fn test_app_with(llm: FakeLlm, renderer: FakeRenderer) -> TestApp {
    test_app_from(llm, renderer, FakeEmbedder::default())
}

fn test_app_from(llm: FakeLlm, renderer: FakeRenderer, embedder: FakeEmbedder) -> TestApp {
    let data_dir = tempfile::tempdir().unwrap();
    let config = LedgerScanConfig::from_env(data_dir.path()).unwrap();
    let store = SqliteStore::open(&config.data_paths.db).unwrap();
    let llm = Arc::new(llm);
    let state = AppState::new(
        config,
        store,
        Arc::new(embedder),
        LLMConfig::default(),
        llm.clone(),
    )
    .with_renderer(Arc::new(renderer));
    TestApp {
        router: build_router(Arc::new(state)),
        llm,
        data_dir,
    }
}

fn test_app() -> TestApp {
    test_app_with(FakeLlm::default(), FakeRenderer { pages: 1, fail: false })
}

/// One-page PDF drawn in Courier 10pt; each placement is `(x, y, text)`.
fn build_pdf(placements: &[(i64, i64, &str)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut operations = Vec::new();
    for (x, y, text) in placements {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 10.into()]));
        operations.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
        operations.push(Operation::new("ET", vec![]));
    }
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
    });
    let kids: Vec<Object> = vec![page_id.into()];
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn ledger_pdf(amount: &str) -> Vec<u8> {
    build_pdf(&[
        (40, 800, "Compte"),
        (160, 800, "Solde"),
        (40, 780, "401000"),
        (160, 780, amount),
        (40, 760, "411000"),
        (160, 760, "98,10-"),
    ])
}

fn multipart_request(field: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"{n}\"\r\nContent-Type: application/pdf\r\n\r\n",
            b = BOUNDARY,
            f = field,
            n = file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/extract")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_extract_new_document() {
    let app = test_app();
    let pdf = ledger_pdf("1 234,56");
    let document_id = content_hash(&pdf);

    let (status, body) = send(&app.router, multipart_request("file", "releve.pdf", &pdf)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documentId"], document_id.as_str());
    assert_eq!(body["data"][0]["compte"][0], "401000");
    assert_eq!(body["data"][0]["débit"], serde_json::json!([0, null]));
    assert_eq!(
        body["images"],
        serde_json::json!([format!("images_pdf/{}_page-0001.jpg", document_id)])
    );

    let data = app.data_dir.path();
    assert!(data.join("uploads").join(format!("{}.pdf", document_id)).is_file());
    assert!(data.join("tokens").join("releve.json").is_file());

    let prompts = app.llm.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("3: 401000"));
    assert!(prompts[0].contains("4: 1 234,56"));
    assert!(!prompts[0].contains("documents similaires"));

    let (status, record) = send(&app.router, get_request(&format!("/documents/{}", document_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["status"], "complete");
    assert_eq!(record["fileName"], "releve.pdf");
    assert_eq!(record["raw"][0], serde_json::json!({"id": "1", "text": "Compte"}));
    assert_eq!(record["finalData"], body["data"]);
}

#[tokio::test]
async fn test_known_document_reuses_final_data() {
    let app = test_app();
    let pdf = ledger_pdf("1 234,56");

    let (first, _) = send(&app.router, multipart_request("file", "a.pdf", &pdf)).await;
    assert_eq!(first, StatusCode::OK);
    let (status, body) = send(&app.router, multipart_request("file", "b.pdf", &pdf)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["solde"][0], "1 234,56");
    assert_eq!(app.llm.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_similar_document_rows_become_examples() {
    let app = test_app();
    let (status, first) = send(&app.router, multipart_request("file", "janvier.pdf", &ledger_pdf("1 234,56"))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app.router, multipart_request("file", "fevrier.pdf", &ledger_pdf("2 000,00"))).await;
    assert_eq!(status, StatusCode::OK);

    let prompts = app.llm.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 2);
    let (_, examples) = prompts[1]
        .split_once("documents similaires")
        .expect("second prompt carries examples");
    assert!(examples.contains(&first["data"][0].to_string()));

    let (_, stats) = send(&app.router, get_request("/stats")).await;
    assert_eq!(stats["extractions"], 2);
    assert_eq!(stats["complete"], 2);
    assert_eq!(stats["embeddedDocuments"], 2);
    assert_eq!(stats["embeddingDimension"], 2);
    assert_eq!(stats["embedder"]["model"], "fake-embedder");
}

#[tokio::test]
async fn test_unsaved_embeddings_still_rank_examples() {
    let embedder = FakeEmbedder {
        extra_vector_from: Some(2),
        ..Default::default()
    };
    let app = test_app_from(
        FakeLlm::default(),
        FakeRenderer { pages: 1, fail: false },
        embedder,
    );
    let (status, first) = send(&app.router, multipart_request("file", "janvier.pdf", &ledger_pdf("1 234,56"))).await;
    assert_eq!(status, StatusCode::OK);

    // The second document's vectors are not stored but still used as queries.
    let (status, _) = send(&app.router, multipart_request("file", "fevrier.pdf", &ledger_pdf("2 000,00"))).await;
    assert_eq!(status, StatusCode::OK);

    let prompts = app.llm.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 2);
    let (_, examples) = prompts[1]
        .split_once("documents similaires")
        .expect("second prompt carries examples");
    assert!(examples.contains(&first["data"][0].to_string()));

    let (_, stats) = send(&app.router, get_request("/stats")).await;
    assert_eq!(stats["complete"], 2);
    assert_eq!(stats["embeddedDocuments"], 1);
}

#[tokio::test]
async fn test_extract_without_file() {
    let app = test_app();
    let (status, body) = send(&app.router, multipart_request("other", "x.pdf", b"%PDF")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Aucun fichier fourni");

    let (status, body) = send(&app.router, multipart_request("file", "", b"%PDF")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Nom de fichier vide");
}

#[tokio::test]
async fn test_unreadable_pdf_fails_token_stage() {
    let app = test_app();
    let (status, body) = send(&app.router, multipart_request("file", "x.pdf", b"not a pdf")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Erreur lors de l'extraction des tokens");
    assert_eq!(app.llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_render_failure_is_500() {
    let app = test_app_with(FakeLlm::default(), FakeRenderer { pages: 1, fail: true });
    let (status, body) = send(&app.router, multipart_request("file", "x.pdf", &ledger_pdf("5,00"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Erreur lors de la conversion en images");
}

#[tokio::test]
async fn test_llm_failure_leaves_pending_placeholder() {
    let llm = FakeLlm {
        fail: true,
        ..Default::default()
    };
    let app = test_app_with(llm, FakeRenderer { pages: 2, fail: false });
    let pdf = ledger_pdf("5,00");

    let (status, body) = send(&app.router, multipart_request("file", "x.pdf", &pdf)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Erreur lors du processing LLM");

    let (_, record) = send(&app.router, get_request(&format!("/documents/{}", content_hash(&pdf)))).await;
    assert_eq!(record["status"], "pending");
}

#[tokio::test]
async fn test_correct_flow() {
    let app = test_app();
    let pdf = ledger_pdf("1 234,56");
    let (_, extracted) = send(&app.router, multipart_request("file", "releve.pdf", &pdf)).await;
    let document_id = extracted["documentId"].as_str().unwrap().to_string();

    let corrected = serde_json::json!([{
        "compte": ["401000", "3"],
        "solde_an": [null, null],
        "solde": ["1 234,65", "4"],
        "débit": [0, null],
        "crédit": [0, null]
    }]);
    let (status, body) = send(
        &app.router,
        json_request(
            "PATCH",
            "/correct",
            serde_json::json!({"documentId": document_id, "finalData": corrected}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "corrected");
    assert_eq!(body["finalData"], corrected);
    assert_eq!(body["raw"][2]["text"], "401000");
    assert_eq!(body["corrections"][0]["version"], 1);
    assert_eq!(body["corrections"][0]["finalData"], extracted["data"]);
    assert!(body["corrections"][0]["timestamp"].is_string());
}

#[tokio::test]
async fn test_correct_validation() {
    let app = test_app();

    let (status, body) = send(
        &app.router,
        json_request("PATCH", "/correct", serde_json::json!({"documentId": "abc"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "documentId et finalData sont requis");

    let (status, _) = send(
        &app.router,
        json_request("PATCH", "/correct", serde_json::json!({"documentId": "abc", "finalData": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app.router,
        json_request(
            "PATCH",
            "/correct",
            serde_json::json!({"documentId": "unknown", "finalData": [{"compte": [null, null]}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Document introuvable");
}

#[tokio::test]
async fn test_unknown_document_is_404() {
    let app = test_app();
    let (status, _) = send(&app.router, get_request("/documents/deadbeef")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_static_token_and_page_files() {
    let app = test_app();
    let pdf = ledger_pdf("1 234,56");
    let (_, body) = send(&app.router, multipart_request("file", "releve.pdf", &pdf)).await;

    let (status, tokens) = send(&app.router, get_request("/data/releve.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tokens[0]["text"], "Compte");
    assert_eq!(tokens[0]["id"], 1);

    let image = format!("/{}", body["images"][0].as_str().unwrap());
    let response = app.router.clone().oneshot(get_request(&image)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
