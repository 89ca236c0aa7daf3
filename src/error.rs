//! Unified error types for boardlink.
//!
//! Device-side handlers never surface these to the caller; they turn every
//! failure into a posted `success: false` result.  Host-side operations
//! return [`RpcError`], which callers can flatten into the classic
//! `(success, result)` pair with [`RpcError::into_outcome`].

use core::fmt;

use serde_json::Value;

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`Transport`](crate::rpc::transport::Transport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The underlying byte channel failed (serial read/write, timeout).
    Io(String),
    /// The exchange was interrupted by the operator.
    Interrupted,
    /// The device wrote to its error stream while executing the code.
    Remote(String),
    /// No session is open.
    NotConnected,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "transport I/O: {msg}"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::Remote(msg) => write!(f, "device error: {msg}"),
            Self::NotConnected => write!(f, "not connected"),
        }
    }
}

impl std::error::Error for TransportError {}

// ---------------------------------------------------------------------------
// Host-side RPC errors
// ---------------------------------------------------------------------------

/// Every failure a host-side call can end in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Sending or receiving failed.  Never retried.
    Transport(TransportError),
    /// The correlator asked for the submitted method and never saw it.
    Timeout { method: String },
    /// A directly requested method never showed up in the result queue.
    NotFound { method: String },
    /// The device printed something that is not a valid result list.
    Decode(String),
    /// More matching results than the protocol allows.
    Consistency { method: String, count: usize },
    /// The caller passed arguments the typed API refuses to send.
    InvalidArgs(&'static str),
    /// A previous caller panicked while holding the session guard.
    SessionPoisoned,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "{e}"),
            Self::Timeout { method } => {
                write!(f, "failed to verify method {method} was executed")
            }
            Self::NotFound { method } => write!(f, "failed to find method {method}"),
            Self::Decode(msg) => write!(f, "malformed reply: {msg}"),
            Self::Consistency { method, count } => write!(
                f,
                "more results than expected for {method} ({count}), internal error"
            ),
            Self::InvalidArgs(msg) => write!(f, "invalid arguments: {msg}"),
            Self::SessionPoisoned => write!(f, "session guard poisoned"),
        }
    }
}

impl std::error::Error for RpcError {}

impl From<TransportError> for RpcError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl RpcError {
    /// Flatten into the `(success, result)` pair.
    ///
    /// Decode failures carry an empty list so callers never see a partial
    /// payload; every other failure carries its message.
    pub fn into_outcome(self) -> (bool, Value) {
        match self {
            Self::Decode(_) => (false, Value::Array(Vec::new())),
            other => (false, Value::String(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Board errors
// ---------------------------------------------------------------------------

/// Peripheral failures reported through [`BoardPort`](crate::app::ports::BoardPort).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// The named pin does not exist on this board.
    UnknownPin(String),
    /// The pin exists but is not configured for the requested direction.
    WrongMode(String),
    /// The timer/channel pair cannot drive PWM.
    PwmUnavailable { timer: u8, channel: u8 },
    /// The ADC conversion failed.
    AdcReadFailed,
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPin(pin) => write!(f, "{pin} is not a pin on this board"),
            Self::WrongMode(pin) => write!(f, "{pin} is not configured for this operation"),
            Self::PwmUnavailable { timer, channel } => {
                write!(f, "timer {timer} channel {channel} cannot drive PWM")
            }
            Self::AdcReadFailed => write!(f, "ADC read failed"),
        }
    }
}

impl std::error::Error for BoardError {}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

/// Raised while building a [`HandlerSet`](crate::app::handlers::HandlerSet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two handlers were registered under the same method name.
    Duplicate(&'static str),
    /// Method names must be non-empty and must not use the diagnostic tag.
    Reserved(&'static str),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate(name) => write!(f, "handler '{name}' registered twice"),
            Self::Reserved(name) => write!(f, "'{name}' is not a usable method name"),
        }
    }
}

impl std::error::Error for RegistryError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Host-side `Result` alias.
pub type Result<T> = core::result::Result<T, RpcError>;
