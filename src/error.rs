//! Unclassified error channel for Patchback.
//!
//! Anything surfacing as a [`PatchbackError`] is treated as an infrastructure
//! fault and propagated to the caller. Ordinary backport rejections are
//! modelled separately in [`crate::outcome::BackportFailure`].

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Message GitHub returns when an App installation lacks a permission.
pub const INTEGRATION_FORBIDDEN_MESSAGE: &str =
    "Resource not accessible by integration";

/// Main error type for Patchback operations.
#[derive(Error, Debug)]
pub enum PatchbackError {
    // Cli args errors
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Webhook payload errors
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    // Hosting API errors
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Forge operation failed: {0}")]
    ForgeError(String),

    #[error("API rate limit exceeded")]
    RateLimitExceeded,

    // Credential errors
    #[error("Installation token expired at {0}")]
    TokenExpired(DateTime<Utc>),

    // Git errors
    #[error("Git operation failed: {0}")]
    GitError(#[from] git2::Error),

    #[error("Remote rejected push: {0}")]
    PushRejected(String),

    // Worker pool errors
    #[error("Backport worker failed: {0}")]
    WorkerError(String),

    // Parsing errors - automatic conversions via #[from]
    #[error("JSON parse error: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Datetime parse error: {0}")]
    ChronoParseError(#[from] chrono::ParseError),

    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] log::SetLoggerError),

    // Generic wrapper for other errors
    #[error(transparent)]
    Other(#[from] color_eyre::Report),
}

/// Result type alias using PatchbackError
pub type Result<T> = std::result::Result<T, PatchbackError>;

impl PatchbackError {
    /// Create a forge error with context
    pub fn forge(msg: impl Into<String>) -> Self {
        Self::ForgeError(msg.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid payload error
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Create a validation error
    pub fn validation_failed(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }
}

// Implement From for std::io::Error - wraps in Other variant for generic I/O errors
impl From<std::io::Error> for PatchbackError {
    fn from(err: std::io::Error) -> Self {
        Self::Other(color_eyre::Report::from(err))
    }
}

impl From<tokio::task::JoinError> for PatchbackError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::WorkerError(err.to_string())
    }
}

// Only the installation-scope 403 is classified; other 403s (secondary rate
// limits, blocked users) stay unclassified.
impl From<octocrab::Error> for PatchbackError {
    fn from(err: octocrab::Error) -> Self {
        match &err {
            octocrab::Error::GitHub { source, .. } => {
                let message = match &source.errors {
                    Some(errors) if !errors.is_empty() => format!(
                        "{}: {}",
                        source.message,
                        errors
                            .iter()
                            .map(|e| e.to_string())
                            .collect::<Vec<String>>()
                            .join(", ")
                    ),
                    _ => source.message.clone(),
                };
                classify_api_status(source.status_code.as_u16(), &message)
                    .unwrap_or_else(|| {
                        Self::ForgeError(format!("GitHub API error: {}", err))
                    })
            }
            _ => Self::ForgeError(format!("GitHub API error: {}", err)),
        }
    }
}

/// Map an API status code and message onto a classified error, if any.
pub fn classify_api_status(status: u16, message: &str) -> Option<PatchbackError> {
    match status {
        403 if message.contains(INTEGRATION_FORBIDDEN_MESSAGE) => {
            Some(PatchbackError::permission_denied(message))
        }
        403 | 429 if message.to_lowercase().contains("rate limit") => {
            Some(PatchbackError::RateLimitExceeded)
        }
        422 => Some(PatchbackError::validation_failed(message)),
        _ => None,
    }
}
