//! Error types for castline.

use thiserror::Error;

/// Main error type for castline operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Authentication was rejected or returned an unusable token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Configuration is missing a required key or is otherwise invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// JSON framing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Unexpected message or sequence from the service.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
