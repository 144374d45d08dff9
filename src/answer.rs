//! Retrieval-augmented answering.
//!
//! Retrieves the top-k chunks for a question, stuffs them verbatim into one
//! prompt, and forwards the prompt to the chat model.

use tracing::info;

use crate::embedding::Embedder;
use crate::error::AppError;
use crate::index::VectorIndex;
use crate::llm::ChatModel;

/// The model's reply plus the files its context came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Distinct source file names of the retrieved chunks, best match first.
    pub sources: Vec<String>,
}

/// Builds the stuffed-context prompt.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n\
         {context}\n\n\
         Question: {question}\n\
         Helpful Answer:"
    )
}

pub async fn answer(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    model: &dyn ChatModel,
    question: &str,
    top_k: usize,
) -> Result<Answer, AppError> {
    let hits = index.query(embedder, question, top_k).await?;

    let context = hits
        .iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut sources: Vec<String> = Vec::new();
    for hit in &hits {
        if !sources.contains(&hit.chunk.source) {
            sources.push(hit.chunk.source.clone());
        }
    }

    let prompt = build_prompt(&context, question);
    let text = model.complete(&prompt).await?;
    info!(
        retrieved = hits.len(),
        model = model.model_name(),
        answer_chars = text.len(),
        "answered question"
    );

    Ok(Answer { text, sources })
}
