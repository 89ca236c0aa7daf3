//! Typed host API: one method per device handler.
//!
//! Each wrapper builds the argument mapping for its handler and goes
//! through [`Client::invoke`].  Defaults follow the device's own.

use serde_json::{Value, json};

use super::client::Client;
use crate::app::handlers::MULTI_RESULTS_METHOD;
use crate::app::ports::{Led, PinMode, Pull};
use crate::error::{Result, RpcError};
use crate::rpc::record::{Args, ResultRecord};
use crate::rpc::transport::Transport;

/// Arguments for [`Client::pwm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PwmRequest {
    /// Name the timer is registered under.
    pub name: String,
    /// Registered GPIO name driving the output.
    pub pin: String,
    pub timer: u8,
    pub channel: u8,
    pub freq_hz: u32,
    pub duty_cycle: u8,
}

impl PwmRequest {
    pub fn new(name: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pin: pin.into(),
            timer: 0,
            channel: 1,
            freq_hz: 0,
            duty_cycle: 50,
        }
    }
}

fn args(value: Value) -> Args {
    match value {
        Value::Object(map) => map,
        _ => Args::new(),
    }
}

impl<T: Transport> Client<T> {
    /// Stop all tasks and return every peripheral to its default state.
    pub fn reset(&self) -> Result<ResultRecord> {
        self.invoke("reset", Args::new())
    }

    pub fn unique_id(&self) -> Result<ResultRecord> {
        self.invoke("unique_id", Args::new())
    }

    /// Server version and board `uname`.
    pub fn version(&self) -> Result<ResultRecord> {
        self.invoke("version", Args::new())
    }

    /// Turn `_debug` diagnostics on or off.
    pub fn debug(&self, enable: bool) -> Result<ResultRecord> {
        self.invoke("debug", args(json!({ "enable": enable })))
    }

    pub fn led(&self, set: &[(Led, bool)]) -> Result<ResultRecord> {
        let pairs: Vec<Value> = set.iter().map(|(led, on)| json!([led.id(), on])).collect();
        self.invoke("led", args(json!({ "set": pairs })))
    }

    /// Blink `led` until told otherwise.  `on_ms == 0` stops it.
    pub fn led_toggle(&self, led: Led, on_ms: u32, off_ms: u32, once: bool) -> Result<ResultRecord> {
        self.invoke(
            "led_toggle",
            args(json!({ "led": led.id(), "on_ms": on_ms, "off_ms": off_ms, "once": once })),
        )
    }

    pub fn init_gpio(&self, name: &str, pin: &str, mode: PinMode, pull: Pull) -> Result<ResultRecord> {
        self.invoke(
            "init_gpio",
            args(json!({ "name": name, "pin": pin, "mode": mode.token(), "pull": pull.token() })),
        )
    }

    pub fn get_gpio(&self, name: &str) -> Result<ResultRecord> {
        self.invoke("get_gpio", args(json!({ "pin": name })))
    }

    pub fn set_gpio(&self, name: &str, value: bool) -> Result<ResultRecord> {
        self.invoke("set_gpio", args(json!({ "name": name, "value": value })))
    }

    /// Mean of `samples` conversions taken `sample_ms` apart.
    pub fn adc_read(&self, pin: &str, samples: u32, sample_ms: u32) -> Result<ResultRecord> {
        self.invoke(
            "adc_read",
            args(json!({ "pin": pin, "samples": samples, "sample_ms": sample_ms })),
        )
    }

    /// Schedule a fixed-rate capture.  Collect it with
    /// [`adc_read_multi_results`](Self::adc_read_multi_results).
    pub fn adc_read_multi(&self, pins: &[&str], samples: u32, freq: u32) -> Result<ResultRecord> {
        if pins.is_empty() {
            return Err(RpcError::InvalidArgs("adc_read_multi needs at least one pin"));
        }
        self.invoke(
            "adc_read_multi",
            args(json!({ "pins": pins, "samples": samples, "freq": freq })),
        )
    }

    /// Take the finished capture of the last `adc_read_multi`.
    pub fn adc_read_multi_results(&self) -> Result<ResultRecord> {
        let mut records = self.get_server_method(MULTI_RESULTS_METHOD, false)?;
        Ok(records.remove(0))
    }

    pub fn pwm(&self, req: &PwmRequest) -> Result<ResultRecord> {
        self.invoke(
            "pwm",
            args(json!({
                "name": req.name,
                "pin": req.pin,
                "timer": req.timer,
                "channel": req.channel,
                "freq": req.freq_hz,
                "duty_cycle": req.duty_cycle,
                "enable": true
            })),
        )
    }

    pub fn pwm_disable(&self, name: &str) -> Result<ResultRecord> {
        self.invoke("pwm", args(json!({ "name": name, "enable": false })))
    }

    /// Returns once the task is scheduled; the final "completed" record
    /// is fetched with `get_server_method("long_running_example", false)`.
    pub fn long_running_example(&self, delay_s: f64) -> Result<ResultRecord> {
        self.invoke("long_running_example", args(json!({ "delay_s": delay_s })))
    }
}
