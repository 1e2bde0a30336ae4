pub mod cli;
pub mod messages;
pub mod network;

// Re-export key types for easy testing
pub use messages::{KeyedRecord, MessageCodec};
pub use network::{Session, SessionConfig, SessionEvent, WebSocketConnector};
