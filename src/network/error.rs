use super::state::ConnectionState;
use crate::messages::CodecError;
use thiserror::Error;

/// Failures reported by a transport implementation
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Handshake with {url} failed: {reason}")]
    Handshake { url: String, reason: String },

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Close handshake failed: {0}")]
    Close(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Errors surfaced to callers of a [`Session`](super::Session)
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Connection failed: {0}")]
    Connection(#[source] TransportError),

    #[error("Operation '{operation}' is not valid in state {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Problems found while loading or validating a session configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Endpoint must not be empty")]
    EmptyEndpoint,

    #[error("Endpoint '{url}' must use the ws:// or wss:// scheme")]
    UnsupportedScheme { url: String },

    #[error("Buffer capacity must be at least {min} bytes, got {actual}")]
    BufferTooSmall { min: usize, actual: usize },

    #[error("Outbound queue depth must be non-zero")]
    ZeroQueueDepth,

    #[error("Could not determine configuration directory")]
    NoConfigDir,

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
