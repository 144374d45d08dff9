//! Domain error taxonomy.
//!
//! Orchestration code uses `anyhow` throughout; these variants exist for the
//! failures the UI treats differently from a generic error:
//!
//! | Variant | Surfaced as |
//! |---------|-------------|
//! | [`AppError::Configuration`] | error banner, pipeline stops |
//! | [`AppError::UnsupportedFormat`] / [`AppError::Parse`] | per-file error banner, batch continues |
//! | [`AppError::ExternalService`] | assistant message prefixed with [`ERROR_MARKER`] |
//! | [`AppError::NotFound`] | error banner |

use thiserror::Error;

/// Prefix of the assistant message recorded when a question cannot be answered.
pub const ERROR_MARKER: &str = "❌ Error: ";

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing secret or invalid configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// File extension outside the supported set (`.pdf`, `.docx`).
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// The parser could not read the file (corrupt, encrypted, truncated).
    #[error("could not read {file}: {message}")]
    Parse { file: String, message: String },

    /// A call to the embedding or language-model service failed.
    #[error("{service} request failed: {message}")]
    ExternalService { service: String, message: String },

    #[error("file not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn external(service: &str, message: impl Into<String>) -> Self {
        AppError::ExternalService {
            service: service.to_string(),
            message: message.into(),
        }
    }

    /// True for failures that should become a banner instead of a 500.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, AppError::Io(_))
    }
}
