//! Per-session state and its transition function.
//!
//! A [`Session`] is changed only through [`Session::apply`]. The controller
//! performs the side effects (disk writes, indexing, model calls) and reports
//! what happened as an [`Event`]; rendering then reads the resulting state.
//! The UI phase is derived, never stored: see [`Session::phase`].

use std::sync::Arc;

use crate::answer::Answer;
use crate::error::{AppError, ERROR_MARKER};
use crate::file_store::FileStamp;
use crate::index::VectorIndex;
use crate::llm::ChatModel;
use crate::models::{ChatMessage, Notice};

/// What the question form should look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No documents uploaded; the question form is disabled.
    NoFiles,
    /// Documents present but the index does not match them yet.
    Pending,
    /// The index matches the stored files; questions are accepted.
    Ready,
}

/// Something that happened to a session.
pub enum Event {
    FileSaved(String),
    FileDeleted(String),
    Indexed {
        index: Arc<VectorIndex>,
        /// Stamps of the files as they were when reading started.
        files: Vec<FileStamp>,
        chunks: usize,
    },
    NothingReadable,
    /// One file could not be read; the rest of the batch went ahead.
    IngestFailed { file: String, error: String },
    /// The pipeline or a store operation failed as a whole.
    ActionFailed(String),
    ConfigurationFailed(String),
    ModelReady(Arc<dyn ChatModel>),
    Asked(String),
    Answered(Answer),
    AnswerFailed(AppError),
    /// A question arrived while the phase was not [`Phase::Ready`].
    AskRejected(Phase),
    ConversationCleared,
}

pub const PLEASE_UPLOAD: &str = "⚠️ Please upload documents first.";
pub const PROCESSING: &str = "📖 Processing in progress...";
pub const NOTHING_READABLE: &str = "No readable content found.";

#[derive(Default)]
pub struct Session {
    transcript: Vec<ChatMessage>,
    processed: bool,
    index: Option<Arc<VectorIndex>>,
    /// Files the current index was built from.
    indexed_files: Vec<FileStamp>,
    llm: Option<Arc<dyn ChatModel>>,
    notices: Vec<Notice>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: Event) {
        match event {
            Event::FileSaved(name) => {
                self.invalidate();
                self.notices.push(Notice::success(format!("✅ Uploaded: {}", name)));
            }
            Event::FileDeleted(name) => {
                self.invalidate();
                self.notices.push(Notice::success(format!("🗑️ Deleted: {}", name)));
            }
            Event::Indexed {
                index,
                files,
                chunks,
            } => {
                self.index = Some(index);
                self.indexed_files = files;
                self.processed = true;
                self.notices
                    .push(Notice::success(format!("✅ Processed {} text sections!", chunks)));
            }
            Event::NothingReadable => {
                self.invalidate();
                self.notices.push(Notice::warning(NOTHING_READABLE));
            }
            Event::IngestFailed { file, error } => {
                self.notices
                    .push(Notice::error(format!("Could not read {}: {}", file, error)));
            }
            Event::ActionFailed(message) | Event::ConfigurationFailed(message) => {
                self.notices.push(Notice::error(message));
            }
            Event::ModelReady(model) => {
                self.llm = Some(model);
            }
            Event::Asked(question) => {
                self.transcript.push(ChatMessage::user(question));
            }
            Event::Answered(answer) => {
                let mut message = ChatMessage::assistant(answer.text);
                message.sources = answer.sources;
                self.transcript.push(message);
            }
            Event::AnswerFailed(error) => {
                self.transcript
                    .push(ChatMessage::assistant(format!("{}{}", ERROR_MARKER, error)));
            }
            Event::AskRejected(phase) => {
                let notice = match phase {
                    Phase::NoFiles => Notice::warning(PLEASE_UPLOAD),
                    _ => Notice::info(PROCESSING),
                };
                self.notices.push(notice);
            }
            Event::ConversationCleared => {
                self.transcript.clear();
            }
        }
    }

    fn invalidate(&mut self) {
        self.processed = false;
        self.index = None;
        self.indexed_files.clear();
    }

    /// Phase for the given directory snapshot. An index built from other
    /// stamps counts as stale, which covers another session adding, deleting
    /// or overwriting a file.
    pub fn phase(&self, files: &[FileStamp]) -> Phase {
        if files.is_empty() {
            Phase::NoFiles
        } else if self.processed && self.index.is_some() && self.indexed_files == files {
            Phase::Ready
        } else {
            Phase::Pending
        }
    }

    pub fn is_processed(&self) -> bool {
        self.processed
    }

    pub fn index(&self) -> Option<Arc<VectorIndex>> {
        self.index.clone()
    }

    pub fn model(&self) -> Option<Arc<dyn ChatModel>> {
        self.llm.clone()
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Notices since the last render. Each is shown once.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
