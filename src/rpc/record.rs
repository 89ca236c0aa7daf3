//! Queue records exchanged between host and device.
//!
//! ```text
//! Command       {"method": "adc_read", "args": {"pin": "X2"}}
//! ResultRecord  {"method": "adc_read", "value": {"value": 812.0, "samples": 1}, "success": True}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Reserved method tag for free-text diagnostics in the result queue.
pub const DEBUG_METHOD: &str = "_debug";

/// Argument mapping carried by a [`Command`].
pub type Args = Map<String, Value>;

/// Anything stored in a [`BoundedQueue`](super::queue::BoundedQueue).
pub trait Tagged {
    /// Method name used for filtering and in-place updates.
    fn method(&self) -> &str;

    fn is_diagnostic(&self) -> bool {
        self.method() == DEBUG_METHOD
    }
}

/// A queued request for a named handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub method: String,
    #[serde(default)]
    pub args: Args,
}

impl Command {
    pub fn new(method: impl Into<String>, args: Args) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }

    /// The `{method, args}` mapping as sent over the wire.
    pub fn to_value(&self) -> Value {
        json!({ "method": self.method, "args": Value::Object(self.args.clone()) })
    }
}

impl Tagged for Command {
    fn method(&self) -> &str {
        &self.method
    }
}

/// A handler's response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub method: String,
    #[serde(default)]
    pub value: Value,
    pub success: bool,
}

impl ResultRecord {
    pub fn ok(method: impl Into<String>, value: Value) -> Self {
        Self {
            method: method.into(),
            value,
            success: true,
        }
    }

    /// Failed result carrying `{"err": msg}`.
    pub fn err(method: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            value: json!({ "err": msg.into() }),
            success: false,
        }
    }

    pub fn diagnostic(text: impl Into<String>) -> Self {
        Self {
            method: DEBUG_METHOD.into(),
            value: Value::String(text.into()),
            success: true,
        }
    }

    /// The `err` string of a failed result, if any.
    pub fn err_message(&self) -> Option<&str> {
        self.value.get("err").and_then(Value::as_str)
    }

    pub fn to_value(&self) -> Value {
        json!({ "method": self.method, "value": self.value, "success": self.success })
    }
}

impl Tagged for ResultRecord {
    fn method(&self) -> &str {
        &self.method
    }
}
