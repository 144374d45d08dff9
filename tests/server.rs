//! HTTP tests: run the router on an ephemeral port and drive it the way a
//! browser would (cookies, multipart upload, form posts, redirects).

use ask_docs::app::App;
use ask_docs::config::{Config, LlmConfig};
use ask_docs::embedding::Embedder;
use ask_docs::error::AppError;
use ask_docs::llm::{ChatModel, ChatModelFactory};
use ask_docs::server::serve;
use async_trait::async_trait;
use std::sync::Arc;
use tempfile::TempDir;

// ─── Fakes ──────────────────────────────────────────────────────────

struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    fn model_name(&self) -> &str {
        "letters"
    }
    fn dims(&self) -> usize {
        26
    }
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; 26];
                for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
                    v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
                }
                v
            })
            .collect())
    }
}

struct FixedModel;

#[async_trait]
impl ChatModel for FixedModel {
    fn model_name(&self) -> &str {
        "fixed"
    }
    async fn complete(&self, _prompt: &str) -> Result<String, AppError> {
        Ok("Chapter 1 introduces the topic.".to_string())
    }
}

fn docx_with_text(text: &str) -> Vec<u8> {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            text
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

/// Starts the web app on 127.0.0.1 with an ephemeral port and returns its base URL.
async fn start_server(tmp: &TempDir) -> String {
    let mut config = Config::minimal();
    config.storage.upload_dir = tmp.path().join("uploaded_documents");
    let factory: ChatModelFactory = Arc::new(|_: &LlmConfig| {
        let model: Arc<dyn ChatModel> = Arc::new(FixedModel);
        Ok(model)
    });
    let app = App::new(config, Arc::new(LetterEmbedder), factory).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        serve(Arc::new(app), listener).await.unwrap();
    });
    format!("http://{}", addr)
}

fn browser() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap()
}

async fn upload(client: &reqwest::Client, base: &str, name: &str, bytes: Vec<u8>) -> String {
    let part = reqwest::multipart::Part::bytes(bytes).file_name(name.to_string());
    let form = reqwest::multipart::Form::new().part("file", part);
    let resp = client
        .post(format!("{}/upload", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.text().await.unwrap()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_version() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;

    let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn first_visit_sets_cookie_and_prompts_for_upload() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;

    let resp = reqwest::get(format!("{}/", base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let cookie = resp
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("ask_docs_session="));

    let html = resp.text().await.unwrap();
    assert!(html.contains("⚠️ Please upload documents first."));
    assert!(html.contains("<fieldset disabled>"));
}

#[tokio::test]
async fn upload_ask_delete_round_trip() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = browser();

    let html = upload(
        &client,
        &base,
        "notes.docx",
        docx_with_text("Chapter 1: Intro. Chapter 2: Detail."),
    )
    .await;
    assert!(html.contains("✅ Uploaded: notes.docx"));
    assert!(html.contains("✅ Processed 1 text sections!"));
    assert!(html.contains("📄 notes.docx"));
    assert!(html.contains("<fieldset>"));
    assert!(tmp
        .path()
        .join("uploaded_documents")
        .join("notes.docx")
        .is_file());

    let html = client
        .post(format!("{}/ask", base))
        .form(&[("question", "What is chapter 1 about?")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("What is chapter 1 about?"));
    assert!(html.contains("Chapter 1 introduces the topic."));
    assert!(html.contains("Sources: notes.docx"));
    assert!(html.contains("Clear Conversation"));

    let html = client
        .post(format!("{}/delete", base))
        .form(&[("name", "notes.docx")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("🗑️ Deleted: notes.docx"));
    assert!(html.contains("⚠️ Please upload documents first."));
    assert!(html.contains("<fieldset disabled>"));
    // The conversation survives the delete until cleared.
    assert!(html.contains("Chapter 1 introduces the topic."));

    let html = client
        .post(format!("{}/clear", base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!html.contains("Chapter 1 introduces the topic."));
    assert!(!html.contains("Clear Conversation"));
}

#[tokio::test]
async fn conversations_are_per_session() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let first = browser();
    let second = browser();

    upload(
        &first,
        &base,
        "notes.docx",
        docx_with_text("Chapter 1: Intro."),
    )
    .await;
    first
        .post(format!("{}/ask", base))
        .form(&[("question", "What is chapter 1 about?")])
        .send()
        .await
        .unwrap();

    // Same documents, separate transcript.
    let html = second
        .get(format!("{}/", base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("📄 notes.docx"));
    assert!(html.contains("✅ Processed 1 text sections!"));
    assert!(!html.contains("What is chapter 1 about?"));
}

#[tokio::test]
async fn unsupported_upload_shows_error_banner() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;
    let client = browser();

    let html = upload(&client, &base, "notes.txt", b"plain text".to_vec()).await;
    assert!(html.contains("notice-error"));
    assert!(html.contains("notes.txt"));
    assert!(html.contains("No files uploaded yet."));
}

#[tokio::test]
async fn upload_without_file_field_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;

    let form = reqwest::multipart::Form::new().text("other", "value");
    let resp = reqwest::Client::new()
        .post(format!("{}/upload", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}
