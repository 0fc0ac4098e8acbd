// src/error.rs

//! Unified error handling for the synchronizer.

use std::fmt;

use thiserror::Error;

/// Result type alias for synchronizer operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// SQLite operation failed
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A request spent its whole retry budget without a usable response.
    #[error("request to {url} exhausted its retry budget: {detail}")]
    RequestExhausted { url: String, detail: String },

    /// The credential source page no longer carries the embedded pair.
    #[error("credential page changed upstream: {0}")]
    CredentialContract(String),

    /// Geocode lookup produced no match and the caller disallowed a tombstone.
    #[error("no match found for '{query}'")]
    NotFound { query: String },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a retry-exhaustion error with the last response context.
    pub fn exhausted(url: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::RequestExhausted {
            url: url.into(),
            detail: detail.to_string(),
        }
    }

    /// Create a credential-contract error.
    pub fn contract(message: impl Into<String>) -> Self {
        Self::CredentialContract(message.into())
    }
}
