//! Error types for token operations.

use std::io;
use std::path::PathBuf;

/// Result type alias for token operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Token acquisition and refresh errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No credential record has been persisted yet.
    #[error("Not authorized: no tokens found at {}", path.display())]
    NotAuthorized {
        /// Token file that was looked up.
        path: PathBuf,
    },

    /// Provider rejected the request.
    #[error("OAuth2 error: {error} - {description}")]
    Provider {
        /// Error code (e.g., `invalid_grant`).
        error: String,
        /// Human-readable description.
        description: String,
    },

    /// Token file exists but does not hold a credential record.
    #[error("Corrupt token file {}: {source}", path.display())]
    Parse {
        /// Token file that failed to parse.
        path: PathBuf,
        /// Underlying decode error.
        source: serde_json::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Success response without the fields a token requires.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// Authorization timeout.
    #[error("Authorization timed out after {0} seconds")]
    Timeout(u64),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Creates a provider error from error code and description.
    #[must_use]
    pub fn provider(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Provider {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Returns true if no credential record exists yet.
    #[must_use]
    pub const fn is_not_authorized(&self) -> bool {
        matches!(self, Self::NotAuthorized { .. })
    }

    /// Returns true if the provider refused the grant.
    #[must_use]
    pub const fn is_provider_rejection(&self) -> bool {
        matches!(self, Self::Provider { .. })
    }

    /// Returns true if the persisted record is unreadable.
    #[must_use]
    pub const fn is_corrupt_state(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}
