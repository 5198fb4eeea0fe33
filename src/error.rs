//! Error types for wp-inspect

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running an inspection
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid URL provided
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to create HTTP client
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpRequest(String),

    /// HTTP response error status
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),

    /// Remote API answered with an error payload
    #[error("API error: {0}")]
    Api(String),

    /// JSON decoding failed
    #[error("invalid JSON response: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// A row referenced a column the result does not declare
    #[error("column '{0}' is not declared by this result")]
    UnknownColumn(String),

    /// Database collaborator failed
    #[error("database query failed: {0}")]
    Database(String),

    /// wp-config.php could not be used
    #[error("site configuration: {0}")]
    SiteConfig(String),

    /// Log file pattern could not be compiled
    #[error("invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// File I/O failed
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV export failed
    #[error("CSV export to '{}' failed: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
