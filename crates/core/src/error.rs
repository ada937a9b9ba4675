//! Error types for the fewshot workspace.
//!
//! A single error enum covers every failure category: configuration, I/O,
//! storage, model transport, prompt composition and session state.

use thiserror::Error;

/// Unified error type for fewshot.
///
/// All fallible functions return `Result<T, AppError>`. Storage and transport
/// failures are usually recovered by the caller rather than surfaced; see
/// `store` and the session controller.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Model provider and transport errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Durable store errors (unreadable record, quota exceeded, ...)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Prompt composition errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// A send was requested while another one is still in flight
    #[error("A request is already in flight")]
    Busy,

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
