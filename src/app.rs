//! Page controller.
//!
//! Performs the side effects behind each user action (store writes, the
//! ingestion pipeline, model calls) and feeds the results into the caller's
//! [`Session`] as events. Both the web server and the one-shot CLI drive the
//! application through [`App`].

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::answer;
use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::error::AppError;
use crate::file_store::FileStore;
use crate::ingest::{self, IngestFailure, PipelineOutcome};
use crate::llm::{http_factory, ChatModelFactory};
use crate::render::PageView;
use crate::session::{Event, Phase, Session};

pub struct App {
    config: Arc<Config>,
    store: FileStore,
    embedder: Arc<dyn Embedder>,
    chat_factory: ChatModelFactory,
}

impl App {
    /// Wires the configured embedding provider and the HTTP chat client.
    pub fn from_config(config: Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        Ok(Self::new(config, embedder, http_factory())?)
    }

    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        chat_factory: ChatModelFactory,
    ) -> Result<Self, AppError> {
        let store = FileStore::open(&config.storage.upload_dir)?;
        Ok(Self {
            config: Arc::new(config),
            store,
            embedder,
            chat_factory,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn upload(&self, session: &mut Session, name: &str, bytes: &[u8]) -> Result<()> {
        match self.store.save(name, bytes) {
            Ok(saved) => session.apply(Event::FileSaved(saved)),
            Err(e) => report(session, e)?,
        }
        Ok(())
    }

    pub fn delete(&self, session: &mut Session, name: &str) -> Result<()> {
        match self.store.delete(name) {
            Ok(()) => session.apply(Event::FileDeleted(name.to_string())),
            Err(e) => report(session, e)?,
        }
        Ok(())
    }

    /// Brings the session up to date with the upload directory.
    ///
    /// Initialises the chat client on first use, then rebuilds the index if
    /// the stored files differ from what the session last indexed.
    pub async fn ensure_ready(&self, session: &mut Session) -> Result<Phase> {
        let files = self.store.snapshot()?;
        if files.is_empty() {
            return Ok(Phase::NoFiles);
        }

        if session.model().is_none() {
            match (self.chat_factory)(&self.config.llm) {
                Ok(model) => session.apply(Event::ModelReady(model)),
                Err(e) => {
                    let message = match e {
                        AppError::Configuration(message) => message,
                        other => other.to_string(),
                    };
                    session.apply(Event::ConfigurationFailed(message));
                    return Ok(session.phase(&files));
                }
            }
        }

        if session.phase(&files) == Phase::Ready {
            return Ok(Phase::Ready);
        }

        info!(files = files.len(), "processing documents");
        match ingest::build_index(&self.store, &self.config, self.embedder.as_ref()).await {
            Ok(PipelineOutcome::Indexed {
                index,
                files,
                chunks,
                failures,
            }) => {
                record_failures(session, failures);
                session.apply(Event::Indexed {
                    index: Arc::new(index),
                    files,
                    chunks,
                });
            }
            Ok(PipelineOutcome::NothingReadable { failures, .. }) => {
                record_failures(session, failures);
                session.apply(Event::NothingReadable);
            }
            Err(e) => report(session, e)?,
        }

        // Scanning again picks up files another session changed meanwhile.
        Ok(session.phase(&self.store.snapshot()?))
    }

    pub async fn ask(&self, session: &mut Session, question: &str) -> Result<()> {
        let question = question.trim();
        if question.is_empty() {
            debug!("ignoring blank question");
            return Ok(());
        }

        let phase = self.ensure_ready(session).await?;
        let (Phase::Ready, Some(index), Some(model)) = (phase, session.index(), session.model())
        else {
            session.apply(Event::AskRejected(phase));
            return Ok(());
        };

        session.apply(Event::Asked(question.to_string()));
        match answer::answer(
            &index,
            self.embedder.as_ref(),
            model.as_ref(),
            question,
            self.config.retrieval.top_k,
        )
        .await
        {
            Ok(answer) => session.apply(Event::Answered(answer)),
            Err(e) => {
                tracing::warn!(error = %e, "question failed");
                session.apply(Event::AnswerFailed(e));
            }
        }
        Ok(())
    }

    pub fn clear(&self, session: &mut Session) {
        session.apply(Event::ConversationCleared);
    }

    /// Snapshot for rendering. Drains the session's pending notices.
    pub fn view(&self, session: &mut Session) -> Result<PageView> {
        let files = self.store.snapshot()?;
        let phase = session.phase(&files);
        Ok(PageView {
            files: files.into_iter().map(|f| f.name).collect(),
            phase,
            transcript: session.transcript().to_vec(),
            notices: session.take_notices(),
        })
    }
}

/// Turns a user-facing error into a banner; anything else propagates.
fn report(session: &mut Session, error: AppError) -> Result<()> {
    if error.is_user_facing() {
        session.apply(Event::ActionFailed(error.to_string()));
        Ok(())
    } else {
        Err(error.into())
    }
}

fn record_failures(session: &mut Session, failures: Vec<IngestFailure>) {
    for (file, error) in failures {
        session.apply(Event::IngestFailed {
            file,
            error: error.to_string(),
        });
    }
}
