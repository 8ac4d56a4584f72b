//! Error types for the order book replica and its feed

use thiserror::Error;

/// Replica, feed and rendering errors
#[derive(Error, Debug)]
pub enum BookError {
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    #[error("WebSocket message error: {0}")]
    WebSocketMessage(String),

    #[error("Failed to parse message: {0}")]
    ParseError(String),

    /// The REST snapshot could not be fetched or was malformed.
    /// The replica stays uninitialized; retry with backoff.
    #[error("Snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    /// A depth update carried unparsable numeric fields. The batch is dropped whole.
    #[error("Malformed depth update: {0}")]
    MalformedDelta(String),

    /// One side of the book is empty, so no mid-price exists right now.
    #[error("Order book has no bids or no asks")]
    EmptyBookTransient,

    #[error("Invalid price band: {0}")]
    InvalidBand(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Connection timeout")]
    ConnectionTimeout,
}

impl BookError {
    /// Errors that only mean "nothing to show yet"
    pub fn is_transient(&self) -> bool {
        matches!(self, BookError::EmptyBookTransient)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BookError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        BookError::WebSocketConnection(err.to_string())
    }
}

impl From<serde_json::Error> for BookError {
    fn from(err: serde_json::Error) -> Self {
        BookError::ParseError(err.to_string())
    }
}

// reqwest is only used for the depth snapshot endpoint
impl From<reqwest::Error> for BookError {
    fn from(err: reqwest::Error) -> Self {
        BookError::SnapshotUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for BookError {
    fn from(err: std::io::Error) -> Self {
        BookError::IpcError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BookError>;
