//! Port traits: the boundary between the handler set and the board.
//!
//! ```text
//!   Handler ──▶ BoardPort ──▶ adapter (simulated board, real HAL, mock)
//! ```
//!
//! Handlers only ever see these opaque operations.  Timers, ADC
//! conversion and pin muxing are the adapter's problem.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::BoardError;

// ───────────────────────────────────────────────────────────────
// Value types
// ───────────────────────────────────────────────────────────────

/// On-board indicator LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Led {
    Red = 1,
    Green = 2,
    Yellow = 3,
    Blue = 4,
}

impl Led {
    pub const ALL: [Self; 4] = [Self::Red, Self::Green, Self::Yellow, Self::Blue];

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Self::Red),
            2 => Some(Self::Green),
            3 => Some(Self::Yellow),
            4 => Some(Self::Blue),
            _ => None,
        }
    }

    pub const fn id(self) -> u8 {
        self as u8
    }
}

/// GPIO direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    OutputPushPull,
    OutputOpenDrain,
}

impl PinMode {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "in" => Some(Self::Input),
            "out_pp" => Some(Self::OutputPushPull),
            "out_od" => Some(Self::OutputOpenDrain),
            _ => None,
        }
    }

    pub const fn token(self) -> &'static str {
        match self {
            Self::Input => "in",
            Self::OutputPushPull => "out_pp",
            Self::OutputOpenDrain => "out_od",
        }
    }

    pub const fn is_output(self) -> bool {
        !matches!(self, Self::Input)
    }
}

/// GPIO bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    None,
    Up,
    Down,
}

impl Pull {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "none" => Some(Self::None),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }

    pub const fn token(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Pins wired to an ADC channel.  X1 is reserved for jig-closed detection.
pub const ADC_VALID_PINS: [&str; 15] = [
    "X2", "X3", "X4", "X5", "X6", "X7", "X8", "X11", "X12", "X19", "X20", "X21", "X22", "Y11",
    "Y8",
];

/// Internal ADC channels.
pub const ADC_INTERNALS: [&str; 4] = ["VBAT", "TEMP", "VREF", "VDD"];

/// Something the ADC can convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdcSource {
    Pin(String),
    VBat,
    Temp,
    VRef,
    Vdd,
}

impl AdcSource {
    /// Accepts an ADC pin name or one of the internal channel names.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "VBAT" => Some(Self::VBat),
            "TEMP" => Some(Self::Temp),
            "VREF" => Some(Self::VRef),
            "VDD" => Some(Self::Vdd),
            pin if ADC_VALID_PINS.contains(&pin) => Some(Self::Pin(pin.to_owned())),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Pin(p) => p,
            Self::VBat => "VBAT",
            Self::Temp => "TEMP",
            Self::VRef => "VREF",
            Self::Vdd => "VDD",
        }
    }
}

/// One PWM output: a timer channel driving a configured pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PwmConfig {
    pub pin: String,
    pub timer: u8,
    pub channel: u8,
    pub freq_hz: u32,
    pub duty_percent: u8,
}

/// Board identity as reported by `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uname {
    pub sysname: String,
    pub nodename: String,
    pub release: String,
    pub version: String,
    pub machine: String,
}

// ───────────────────────────────────────────────────────────────
// Board port (driven adapter: handlers → hardware)
// ───────────────────────────────────────────────────────────────

/// Every side effect a handler can have on the board.
pub trait BoardPort: Send + 'static {
    fn set_led(&mut self, led: Led, on: bool);

    /// Claim `pin` with the given direction and bias.
    fn configure_pin(&mut self, pin: &str, mode: PinMode, pull: Pull) -> Result<(), BoardError>;

    /// Return `pin` to a floating input.
    fn release_pin(&mut self, pin: &str);

    fn read_pin(&mut self, pin: &str) -> Result<bool, BoardError>;

    fn write_pin(&mut self, pin: &str, high: bool) -> Result<(), BoardError>;

    /// One raw conversion.
    fn read_adc(&mut self, source: &AdcSource) -> Result<f64, BoardError>;

    fn start_pwm(&mut self, config: &PwmConfig) -> Result<(), BoardError>;

    /// Stop the timer and everything it drives.
    fn stop_pwm(&mut self, timer: u8);

    fn unique_id(&self) -> heapless::Vec<u8, 16>;

    fn uname(&self) -> Uname;
}

/// A board shared between the dispatcher and spawned handler tasks.
pub type SharedBoard<B> = Arc<Mutex<B>>;
