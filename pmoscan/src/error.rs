//! Error types for the scan scheduler and its transport

/// Result type alias for scan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fetching or scheduling channel data
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Server answered with a status that is neither data, not-modified nor no-data
    #[error("Server returned status {0}")]
    Status(u16),

    /// A metadata header could not be parsed as float seconds
    #[error("Invalid {name} header: {value:?}")]
    InvalidHeader { name: String, value: String },

    /// A time-only probe returned a body that is not a timestamp
    #[error("Invalid time value: {0:?}")]
    InvalidTime(String),

    /// The channel is not registered in any display group
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    /// The background worker has stopped
    #[error("Scan worker is not running")]
    WorkerClosed,

    /// Configuration error (from pmoconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid header error
    pub fn invalid_header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidHeader {
            name: name.into(),
            value: value.into(),
        }
    }
}
