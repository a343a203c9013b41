use serde::{Deserialize, Serialize};
use std::fmt;

/// Single structured error shape shared by the core, the AI layer and the CLI.
///
/// Codes in use:
/// - `DOC_UNREADABLE`: the document container could not be opened (skip the document).
/// - `CHUNK_CONFIG_INVALID`: chunk size/overlap misconfigured (fatal, fail before ingest).
/// - `AI_EMBEDDINGS_FAILED` / `AI_GENERATION_FAILED`: backend failures (retryable when the
///   transport failed).
/// - `UPLOAD_*`: caller-side upload validation.
/// - `AI_INDEX_*`: index persistence and model consistency.
/// - `CONFIG_INVALID`: configuration could not be loaded or failed validation.
/// - `QUESTION_EMPTY` / `TIMESTAMP_INVALID`: caller input rejected at the pipeline surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }

    /// Message suitable for showing to an end user, including details when present.
    pub fn user_message(&self) -> String {
        match self.details.as_deref() {
            Some(d) if !d.trim().is_empty() => format!("{} ({})", self.message, d),
            _ => self.message.clone(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
