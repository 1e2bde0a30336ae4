pub mod config;
pub mod error;
pub mod receive;
pub mod send;
pub mod session;
pub mod state;
pub mod stats;
pub mod transport;
pub mod websocket;

pub use config::{SessionConfig, DEFAULT_BUFFER_CAPACITY};
pub use error::{ConfigError, SessionError, TransportError};
pub use receive::{LoopExit, SessionEvent};
pub use send::{SendOutcome, SkipReason};
pub use session::{Session, SessionEvents};
pub use state::{ConnectionState, SessionStatus};
pub use stats::SessionStats;
pub use transport::{
    CloseStatus, Connector, FrameKind, FrameSink, FrameSource, HandshakeRequest, ReceiveResult,
    SharedSocketState, SocketState, TransportHandle, CLOSE_ABNORMAL, CLOSE_NORMAL,
};
pub use websocket::WebSocketConnector;
