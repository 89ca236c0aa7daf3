//! Runtime configuration.
//!
//! Device-side timing lives in [`ServerConfig`]; host-side polling lives in
//! [`ClientConfig`].  Both deserialize from JSON so the simulator can take
//! a config file, and both fall back to the protocol defaults.

use core::time::Duration;

use serde::{Deserialize, Serialize};

/// Default capacity of both device queues.
pub const QUEUE_CAPACITY: usize = 10;

/// Device server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Pause between dispatcher steps (milliseconds).
    pub dispatch_sleep_ms: u64,
    /// Post `_debug` diagnostics into the result queue.
    pub debug: bool,
    /// Stack size for spawned handler tasks (KiB).
    pub task_stack_kb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dispatch_sleep_ms: 100,
            debug: false,
            task_stack_kb: 64,
        }
    }
}

impl ServerConfig {
    pub fn dispatch_sleep(&self) -> Duration {
        Duration::from_millis(self.dispatch_sleep_ms)
    }
}

/// Host correlator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Wait before every result fetch (milliseconds).
    pub poll_interval_ms: u64,
    /// Non-diagnostic fetch attempts before giving up.
    pub retries: u32,
    /// Name the device server is imported under.
    pub server_module: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            retries: 5,
            server_module: "boardlink_main".into(),
        }
    }
}

/// Errors from [`ClientConfig::from_json`] / [`ServerConfig::from_json`].
#[derive(Debug)]
pub enum ConfigError {
    /// The document is not valid JSON for this struct.
    Parse(serde_json::Error),
    /// A field failed range validation.
    ValidationFailed(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "config parse: {}", e),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ClientConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject values that would make every call fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retries == 0 {
            return Err(ConfigError::ValidationFailed("retries must be at least 1"));
        }
        if self.server_module.is_empty()
            || !self
                .server_module
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::ValidationFailed(
                "server_module must be a plain identifier",
            ));
        }
        Ok(())
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }
}

impl ServerConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        if config.task_stack_kb == 0 {
            return Err(ConfigError::ValidationFailed("task_stack_kb must be non-zero"));
        }
        Ok(config)
    }
}
