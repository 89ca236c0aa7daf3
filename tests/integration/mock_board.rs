//! Recording board for integration tests.
//!
//! Every port call is appended to `calls` so tests can assert on the full
//! peripheral history.  ADC conversions pop from a scripted queue and fall
//! back to a fixed reading once it runs dry.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use boardlink::app::ports::{AdcSource, BoardPort, Led, PinMode, Pull, PwmConfig, Uname};
use boardlink::error::BoardError;

// ── Board call record ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum BoardCall {
    SetLed(Led, bool),
    Configure(String, PinMode, Pull),
    Release(String),
    Write(String, bool),
    StartPwm(PwmConfig),
    StopPwm(u8),
}

// ── MockBoard ─────────────────────────────────────────────────

/// Call log shared with the test after the board moves into a dispatcher.
pub type CallLog = Arc<Mutex<Vec<BoardCall>>>;

pub struct MockBoard {
    pub calls: CallLog,
    pub adc: VecDeque<f64>,
    pub adc_fallback: f64,
    pub levels: Vec<(String, bool)>,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new() -> Self {
        Self {
            calls: CallLog::default(),
            adc: VecDeque::new(),
            adc_fallback: 512.0,
            levels: Vec::new(),
        }
    }

    /// Conversions returned in order before falling back.
    pub fn with_adc(mut self, readings: &[f64]) -> Self {
        self.adc.extend(readings);
        self
    }

    pub fn log(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: BoardCall) {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(call);
    }
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardPort for MockBoard {
    fn set_led(&mut self, led: Led, on: bool) {
        self.record(BoardCall::SetLed(led, on));
    }

    fn configure_pin(&mut self, pin: &str, mode: PinMode, pull: Pull) -> Result<(), BoardError> {
        if pin.starts_with('Z') {
            return Err(BoardError::UnknownPin(pin.into()));
        }
        self.record(BoardCall::Configure(pin.into(), mode, pull));
        Ok(())
    }

    fn release_pin(&mut self, pin: &str) {
        self.record(BoardCall::Release(pin.into()));
    }

    fn read_pin(&mut self, pin: &str) -> Result<bool, BoardError> {
        Ok(self
            .levels
            .iter()
            .rev()
            .find(|(p, _)| p == pin)
            .is_some_and(|(_, high)| *high))
    }

    fn write_pin(&mut self, pin: &str, high: bool) -> Result<(), BoardError> {
        self.levels.push((pin.into(), high));
        self.record(BoardCall::Write(pin.into(), high));
        Ok(())
    }

    fn read_adc(&mut self, _source: &AdcSource) -> Result<f64, BoardError> {
        Ok(self.adc.pop_front().unwrap_or(self.adc_fallback))
    }

    fn start_pwm(&mut self, config: &PwmConfig) -> Result<(), BoardError> {
        self.record(BoardCall::StartPwm(config.clone()));
        Ok(())
    }

    fn stop_pwm(&mut self, timer: u8) {
        self.record(BoardCall::StopPwm(timer));
    }

    fn unique_id(&self) -> heapless::Vec<u8, 16> {
        [0xde, 0xad, 0xbe, 0xef].into_iter().collect()
    }

    fn uname(&self) -> Uname {
        Uname {
            sysname: "mock".into(),
            nodename: "mock".into(),
            release: "0".into(),
            version: "0".into(),
            machine: "MockBoard".into(),
        }
    }
}
