use super::error::ConfigError;
use crate::messages::DEFAULT_MAX_MESSAGE_SIZE;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default inbound buffer capacity (4KB)
pub const DEFAULT_BUFFER_CAPACITY: usize = 1 << 12;
/// Smallest inbound buffer a session accepts
pub const MIN_BUFFER_CAPACITY: usize = 64;
pub const DEFAULT_OUTBOUND_QUEUE_DEPTH: usize = 64;
pub const DEFAULT_HELLO_TEXT: &str = "hello";
pub const DEFAULT_CLOSE_REASON: &str = "OK";

/// Settings for one realtime session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Remote socket address, e.g. `wss://example.com/gaming`
    pub endpoint: String,
    /// Sent as the `Authorization` header during the handshake, e.g. `Bearer <token>`
    pub authorization: Option<String>,
    /// Capacity of the reusable inbound buffer; also the largest message the
    /// receive loop will accept
    pub buffer_capacity: usize,
    /// Text of the mandatory first frame sent after connecting
    pub hello_text: String,
    /// Largest binary record the codec will encode or decode
    pub max_message_size: usize,
    /// Frames that may wait for the writer before `send` suspends
    pub outbound_queue_depth: usize,
    /// Reason string sent with the normal-closure close frame
    pub close_reason: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            authorization: None,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            hello_text: DEFAULT_HELLO_TEXT.to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            outbound_queue_depth: DEFAULT_OUTBOUND_QUEUE_DEPTH,
            close_reason: DEFAULT_CLOSE_REASON.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_authorization(mut self, authorization: impl Into<String>) -> Self {
        self.authorization = Some(authorization.into());
        self
    }

    pub fn with_buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }

    pub fn with_hello_text(mut self, hello_text: impl Into<String>) -> Self {
        self.hello_text = hello_text.into();
        self
    }

    /// Check the settings a session cannot run without
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.endpoint)?;
        if self.buffer_capacity < MIN_BUFFER_CAPACITY {
            return Err(ConfigError::BufferTooSmall {
                min: MIN_BUFFER_CAPACITY,
                actual: self.buffer_capacity,
            });
        }
        if self.outbound_queue_depth == 0 {
            return Err(ConfigError::ZeroQueueDepth);
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_file() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("dev", "rtsession", "rtsession")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Accept only `ws://` and `wss://` endpoints; warn on the insecure one
pub fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(ConfigError::EmptyEndpoint);
    }
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("wss://") && endpoint.len() > "wss://".len() {
        return Ok(());
    }
    if lower.starts_with("ws://") && endpoint.len() > "ws://".len() {
        warn!(endpoint = endpoint, "Endpoint does not use a secure WebSocket scheme");
        return Ok(());
    }
    Err(ConfigError::UnsupportedScheme {
        url: endpoint.to_string(),
    })
}
