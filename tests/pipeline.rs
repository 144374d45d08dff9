//! End-to-end scenarios through the page controller, without HTTP.
//!
//! Uses a bag-of-letters embedder and scripted chat models so the whole
//! upload → index → answer loop runs offline.

use ask_docs::app::App;
use ask_docs::chunk;
use ask_docs::config::{Config, LlmConfig};
use ask_docs::embedding::Embedder;
use ask_docs::error::{AppError, ERROR_MARKER};
use ask_docs::extract;
use ask_docs::llm::{ChatModel, ChatModelFactory};
use ask_docs::models::{NoticeLevel, Role, SourceDocument};
use ask_docs::session::{Phase, Session, NOTHING_READABLE, PLEASE_UPLOAD};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const NOTES: &str = "Chapter 1: Intro. Chapter 2: Detail.";

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

/// Fails the first `failures` calls, then answers. Keeps every prompt.
struct ScriptedModel {
    failures: usize,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }
    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(AppError::external("chat", "503 Service Unavailable"));
        }
        Ok("Chapter 1 introduces the topic.".to_string())
    }
}

fn scripted(failures: usize) -> Arc<ScriptedModel> {
    Arc::new(ScriptedModel {
        failures,
        calls: AtomicUsize::new(0),
        prompts: Mutex::new(Vec::new()),
    })
}

fn factory_for(model: Arc<ScriptedModel>) -> ChatModelFactory {
    Arc::new(move |_: &LlmConfig| {
        let model: Arc<dyn ChatModel> = model.clone();
        Ok(model)
    })
}

fn app_with(tmp: &TempDir, model: Arc<ScriptedModel>) -> App {
    let mut config = Config::minimal();
    config.storage.upload_dir = tmp.path().join("uploaded_documents");
    App::new(config, Arc::new(LetterEmbedder), factory_for(model)).unwrap()
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

/// Minimal PDF with one page of Helvetica text. Offsets in the xref table
/// are computed while the body is written.
fn minimal_pdf_with_text(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn messages(session: &mut Session) -> Vec<String> {
    session
        .take_notices()
        .into_iter()
        .map(|n| n.message)
        .collect()
}

#[tokio::test]
async fn notes_document_yields_one_chunk_and_an_answer() {
    let tmp = TempDir::new().unwrap();
    let model = scripted(0);
    let app = app_with(&tmp, model.clone());
    let mut session = Session::new();

    app.upload(&mut session, "notes.docx", &docx_with_text(NOTES))
        .unwrap();
    assert_eq!(app.ensure_ready(&mut session).await.unwrap(), Phase::Ready);
    assert_eq!(
        messages(&mut session),
        vec!["✅ Uploaded: notes.docx", "✅ Processed 1 text sections!"]
    );
    assert_eq!(session.index().unwrap().len(), 1);

    app.ask(&mut session, "What is chapter 1 about?")
        .await
        .unwrap();
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, Role::User);
    assert_eq!(transcript[0].content, "What is chapter 1 about?");
    assert_eq!(transcript[1].role, Role::Assistant);
    assert!(!transcript[1].content.is_empty());
    assert_eq!(transcript[1].sources, vec!["notes.docx"]);

    // The single chunk is the whole document and goes into the prompt as is.
    let prompts = model.prompts.lock().unwrap();
    assert!(prompts[0].contains(NOTES));
    assert!(prompts[0].contains("Question: What is chapter 1 about?"));
}

#[tokio::test]
async fn model_failure_is_recorded_and_session_stays_usable() {
    let tmp = TempDir::new().unwrap();
    let app = app_with(&tmp, scripted(1));
    let mut session = Session::new();
    app.upload(&mut session, "notes.docx", &docx_with_text(NOTES))
        .unwrap();

    app.ask(&mut session, "What is chapter 1 about?")
        .await
        .unwrap();
    assert_eq!(session.transcript().len(), 2);
    assert!(session.transcript()[1].content.starts_with(ERROR_MARKER));
    assert!(session.transcript()[1].content.contains("503"));

    app.ask(&mut session, "And chapter 2?").await.unwrap();
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 4);
    assert_eq!(transcript[3].content, "Chapter 1 introduces the topic.");
}

#[tokio::test]
async fn deleting_the_only_file_blocks_questions() {
    let tmp = TempDir::new().unwrap();
    let app = app_with(&tmp, scripted(0));
    let mut session = Session::new();
    app.upload(&mut session, "notes.docx", &docx_with_text(NOTES))
        .unwrap();
    assert_eq!(app.ensure_ready(&mut session).await.unwrap(), Phase::Ready);
    assert!(session.is_processed());

    app.delete(&mut session, "notes.docx").unwrap();
    assert!(!session.is_processed());
    session.take_notices();

    app.ask(&mut session, "What is chapter 1 about?")
        .await
        .unwrap();
    assert!(session.transcript().is_empty());
    let view = app.view(&mut session).unwrap();
    assert_eq!(view.phase, Phase::NoFiles);
    assert!(!view.form_enabled());
    assert_eq!(view.notices.len(), 1);
    assert_eq!(view.notices[0].message, PLEASE_UPLOAD);
}

#[tokio::test]
async fn unreadable_file_does_not_block_readable_ones() {
    let tmp = TempDir::new().unwrap();
    let app = app_with(&tmp, scripted(0));
    let mut session = Session::new();
    app.upload(&mut session, "broken.pdf", b"not a valid pdf")
        .unwrap();
    app.upload(&mut session, "notes.docx", &docx_with_text(NOTES))
        .unwrap();
    session.take_notices();

    assert_eq!(app.ensure_ready(&mut session).await.unwrap(), Phase::Ready);
    let notices = session.take_notices();
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert!(notices[0].message.contains("broken.pdf"));
    assert_eq!(notices[1].message, "✅ Processed 1 text sections!");
}

#[tokio::test]
async fn only_unreadable_files_warn_and_stay_pending() {
    let tmp = TempDir::new().unwrap();
    let app = app_with(&tmp, scripted(0));
    let mut session = Session::new();
    app.upload(&mut session, "empty.docx", &docx_with_text(""))
        .unwrap();
    session.take_notices();

    assert_eq!(app.ensure_ready(&mut session).await.unwrap(), Phase::Pending);
    let notices = session.take_notices();
    assert_eq!(notices.last().unwrap().level, NoticeLevel::Warning);
    assert_eq!(notices.last().unwrap().message, NOTHING_READABLE);

    app.ask(&mut session, "Anything?").await.unwrap();
    assert!(session.transcript().is_empty());
}

#[tokio::test]
async fn upload_from_another_session_triggers_reindex() {
    let tmp = TempDir::new().unwrap();
    let app = app_with(&tmp, scripted(0));
    let mut alice = Session::new();
    let mut bob = Session::new();

    app.upload(&mut alice, "notes.docx", &docx_with_text(NOTES))
        .unwrap();
    assert_eq!(app.ensure_ready(&mut alice).await.unwrap(), Phase::Ready);
    alice.take_notices();

    app.upload(&mut bob, "more.docx", &docx_with_text("Appendix A: Tables."))
        .unwrap();

    let view = app.view(&mut alice).unwrap();
    assert_eq!(view.phase, Phase::Pending);
    assert_eq!(app.ensure_ready(&mut alice).await.unwrap(), Phase::Ready);
    assert_eq!(
        messages(&mut alice),
        vec!["✅ Processed 2 text sections!"]
    );
}

#[tokio::test]
async fn clear_conversation_keeps_documents_ready() {
    let tmp = TempDir::new().unwrap();
    let app = app_with(&tmp, scripted(0));
    let mut session = Session::new();
    app.upload(&mut session, "notes.docx", &docx_with_text(NOTES))
        .unwrap();
    app.ask(&mut session, "What is chapter 1 about?")
        .await
        .unwrap();
    assert_eq!(session.transcript().len(), 2);

    app.clear(&mut session);
    assert!(session.transcript().is_empty());
    assert_eq!(app.view(&mut session).unwrap().phase, Phase::Ready);
}

#[tokio::test]
async fn notes_pdf_yields_one_chunk_and_an_answer() {
    let tmp = TempDir::new().unwrap();
    let model = scripted(0);
    let app = app_with(&tmp, model.clone());
    let mut session = Session::new();
    app.upload(&mut session, "notes.pdf", &minimal_pdf_with_text(NOTES))
        .unwrap();
    assert_eq!(messages(&mut session), vec!["✅ Uploaded: notes.pdf"]);

    assert_eq!(app.ensure_ready(&mut session).await.unwrap(), Phase::Ready);
    assert_eq!(
        messages(&mut session),
        vec!["✅ Processed 1 text sections!"]
    );
    assert_eq!(session.index().unwrap().len(), 1);

    app.ask(&mut session, "What is chapter 1 about?")
        .await
        .unwrap();
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert!(!transcript[1].content.is_empty());
    assert!(!transcript[1].content.starts_with(ERROR_MARKER));
    assert_eq!(transcript[1].sources, vec!["notes.pdf"]);

    // The only chunk carries the page text into the prompt.
    let prompts = model.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(NOTES));
}

#[tokio::test]
async fn overwrite_from_another_session_triggers_reindex() {
    let tmp = TempDir::new().unwrap();
    let model = scripted(0);
    let app = app_with(&tmp, model.clone());
    let mut alice = Session::new();
    let mut bob = Session::new();

    app.upload(&mut alice, "notes.docx", &docx_with_text("OLD CONTENT alpha"))
        .unwrap();
    assert_eq!(app.ensure_ready(&mut alice).await.unwrap(), Phase::Ready);
    alice.take_notices();

    // Same name, different bytes: the listing by name does not change.
    let revised = "NEW CONTENT beta, rewritten with a considerably longer body of text.";
    app.upload(&mut bob, "notes.docx", &docx_with_text(revised))
        .unwrap();

    let view = app.view(&mut alice).unwrap();
    assert_eq!(view.files, vec!["notes.docx"]);
    assert_eq!(view.phase, Phase::Pending);

    app.ask(&mut alice, "What does the content say?")
        .await
        .unwrap();
    assert_eq!(
        messages(&mut alice),
        vec!["✅ Processed 1 text sections!"]
    );
    let prompts = model.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("NEW CONTENT beta"));
    assert!(!prompts[0].contains("OLD CONTENT alpha"));
}

#[test]
fn loaded_documents_split_back_into_their_text() {
    let tmp = TempDir::new().unwrap();
    let config = Config::minimal();
    let overlap = config.chunking.chunk_overlap;

    let body: String = (0..90)
        .map(|i| format!("Sentence {} of chapter {}. ", i, i / 10 + 1))
        .collect();
    let docx_path = tmp.path().join("long.docx");
    std::fs::write(&docx_path, docx_with_text(&body)).unwrap();
    let pdf_path = tmp.path().join("notes.pdf");
    std::fs::write(&pdf_path, minimal_pdf_with_text(NOTES)).unwrap();

    let documents: Vec<SourceDocument> = [("long.docx", &docx_path), ("notes.pdf", &pdf_path)]
        .into_iter()
        .map(|(name, path)| SourceDocument {
            name: name.to_string(),
            text: extract::load(path).unwrap(),
        })
        .collect();
    assert_eq!(documents[0].text, format!("{}\n", body));
    assert!(documents[1].text.contains(NOTES));

    let chunks = chunk::split(&documents, &config.chunking);
    for doc in &documents {
        let own: Vec<_> = chunks.iter().filter(|c| c.source == doc.name).collect();
        let mut rebuilt = String::new();
        for (i, c) in own.iter().enumerate() {
            assert_eq!(c.index, i);
            assert!(c.text.chars().count() <= config.chunking.chunk_size);
            if i == 0 {
                rebuilt.push_str(&c.text);
            } else {
                rebuilt.extend(c.text.chars().skip(overlap));
            }
        }
        assert_eq!(rebuilt, doc.text, "{} does not reconstruct", doc.name);
    }
    assert!(chunks.iter().filter(|c| c.source == "long.docx").count() > 1);
    assert_eq!(chunks.iter().filter(|c| c.source == "notes.pdf").count(), 1);
}
