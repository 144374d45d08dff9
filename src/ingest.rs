//! Ingestion pipeline orchestration.
//!
//! Coordinates the full rebuild: file store → text extraction → chunking →
//! embedding → vector index. There is no incremental path; every call reads
//! every stored file.

use tracing::{info, warn};

use crate::chunk;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::AppError;
use crate::extract;
use crate::file_store::{FileStamp, FileStore};
use crate::index::VectorIndex;
use crate::models::SourceDocument;

/// Files that could not be read, with the reason.
pub type IngestFailure = (String, AppError);

/// Result of loading every stored file.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Files in the store at the time of loading.
    pub files: Vec<FileStamp>,
    /// Documents with readable content, in file order.
    pub documents: Vec<SourceDocument>,
    pub failures: Vec<IngestFailure>,
}

/// Outcome of a full pipeline run.
#[derive(Debug)]
pub enum PipelineOutcome {
    Indexed {
        index: VectorIndex,
        files: Vec<FileStamp>,
        chunks: usize,
        failures: Vec<IngestFailure>,
    },
    /// No file yielded any text; nothing was indexed.
    NothingReadable {
        files: Vec<FileStamp>,
        failures: Vec<IngestFailure>,
    },
}

/// Loads every listed file. A file that fails to parse is recorded and
/// skipped; the rest of the batch continues.
///
/// Blocking: reads from disk and parses on the calling thread.
pub fn ingest_all(store: &FileStore) -> Result<IngestReport, AppError> {
    let files = store.snapshot()?;
    let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
    let mut report = IngestReport {
        files,
        ..IngestReport::default()
    };

    for name in names {
        match extract::load(&store.path_of(&name)) {
            Ok(text) if text.trim().is_empty() => {
                warn!(file = %name, "no text extracted");
            }
            Ok(text) => {
                info!(file = %name, chars = text.chars().count(), "extracted text");
                report.documents.push(SourceDocument { name, text });
            }
            Err(e) => {
                warn!(file = %name, error = %e, "failed to read document");
                report.failures.push((name, e));
            }
        }
    }

    Ok(report)
}

/// Runs the whole pipeline against the current contents of `store`.
pub async fn build_index(
    store: &FileStore,
    config: &Config,
    embedder: &dyn Embedder,
) -> Result<PipelineOutcome, AppError> {
    let report = {
        let store = store.clone();
        tokio::task::spawn_blocking(move || ingest_all(&store))
            .await
            .map_err(|e| AppError::Io(std::io::Error::other(e)))??
    };
    if report.documents.is_empty() {
        return Ok(PipelineOutcome::NothingReadable {
            files: report.files,
            failures: report.failures,
        });
    }

    let chunks = chunk::split(&report.documents, &config.chunking);
    let chunk_count = chunks.len();
    let index = VectorIndex::build(chunks, embedder, config.embedding.batch_size).await?;

    info!(
        documents = report.documents.len(),
        chunks = chunk_count,
        failed = report.failures.len(),
        "processed documents"
    );

    Ok(PipelineOutcome::Indexed {
        index,
        files: report.files,
        chunks: chunk_count,
        failures: report.failures,
    })
}
