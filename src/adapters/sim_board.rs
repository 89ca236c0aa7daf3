//! Simulated board: an in-memory [`BoardPort`] for the simulator and tests.
//!
//! Every GPIO line and LED is a [`SimPin`] driven through the
//! `embedded-hal` digital traits, so the board behaves the way a HAL-backed
//! adapter would: reading an output returns its driven level, reading an
//! input returns the external level or the pull bias.
//!
//! ADC conversions come from a deterministic signal function of
//! `(source, n)` where `n` counts previous reads of that source.
//!
//! | Header | Lines     |
//! |--------|-----------|
//! | X      | X1 - X24  |
//! | Y      | Y1 - Y12  |

use core::convert::Infallible;
use std::collections::{BTreeMap, HashMap};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin, StatefulOutputPin};

use crate::app::ports::{
    ADC_VALID_PINS, AdcSource, BoardPort, Led, PinMode, Pull, PwmConfig, Uname,
};
use crate::error::BoardError;

/// Timers able to drive PWM.
const PWM_TIMERS: core::ops::RangeInclusive<u8> = 1..=14;
/// Output-compare channels per timer.
const PWM_CHANNELS: core::ops::RangeInclusive<u8> = 1..=4;

// ── SimPin ────────────────────────────────────────────────────

/// One simulated GPIO line.
#[derive(Debug, Clone)]
pub struct SimPin {
    mode: Option<PinMode>,
    pull: Pull,
    driven: bool,
    external: Option<bool>,
}

impl SimPin {
    pub const fn new() -> Self {
        Self {
            mode: None,
            pull: Pull::None,
            driven: false,
            external: None,
        }
    }

    pub fn mode(&self) -> Option<PinMode> {
        self.mode
    }

    fn release(&mut self) {
        self.mode = None;
        self.pull = Pull::None;
        self.driven = false;
    }
}

impl Default for SimPin {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        if self.mode.is_some_and(PinMode::is_output) {
            return Ok(self.driven);
        }
        Ok(self.external.unwrap_or(self.pull == Pull::Up))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.driven = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.driven = true;
        Ok(())
    }
}

impl StatefulOutputPin for SimPin {
    fn is_set_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.driven)
    }

    fn is_set_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.driven)
    }
}

// ── SimBoard ──────────────────────────────────────────────────

/// Deterministic ADC signal: `(source, n) -> raw reading`.
pub type AdcSignal = Box<dyn FnMut(&AdcSource, u32) -> f64 + Send>;

pub struct SimBoard {
    leds: [SimPin; 4],
    pins: BTreeMap<String, SimPin>,
    pwm: BTreeMap<u8, PwmConfig>,
    adc_reads: HashMap<String, u32>,
    signal: AdcSignal,
    uid: [u8; 12],
}

impl SimBoard {
    pub fn new() -> Self {
        let pins = (1..=24)
            .map(|n| format!("X{n}"))
            .chain((1..=12).map(|n| format!("Y{n}")))
            .map(|name| (name, SimPin::new()))
            .collect();
        Self {
            leds: Default::default(),
            pins,
            pwm: BTreeMap::new(),
            adc_reads: HashMap::new(),
            signal: Box::new(default_signal),
            uid: [
                0x30, 0x00, 0x3d, 0x00, 0x0e, 0x51, 0x35, 0x33, 0x36, 0x34, 0x39, 0x33,
            ],
        }
    }

    /// Replace the ADC signal.
    pub fn with_adc_signal(
        mut self,
        signal: impl FnMut(&AdcSource, u32) -> f64 + Send + 'static,
    ) -> Self {
        self.signal = Box::new(signal);
        self
    }

    pub fn with_unique_id(mut self, uid: [u8; 12]) -> Self {
        self.uid = uid;
        self
    }

    // ── Inspection ────────────────────────────────────────────

    pub fn led_is_on(&mut self, led: Led) -> bool {
        let Ok(on) = self.leds[usize::from(led.id() - 1)].is_set_high();
        on
    }

    pub fn pin_mode(&self, pin: &str) -> Option<PinMode> {
        self.pins.get(pin).and_then(SimPin::mode)
    }

    /// Level an external circuit applies to an input line.
    pub fn drive_input(&mut self, pin: &str, level: bool) -> Result<(), BoardError> {
        let line = self
            .pins
            .get_mut(pin)
            .ok_or_else(|| BoardError::UnknownPin(pin.into()))?;
        line.external = Some(level);
        Ok(())
    }

    pub fn pwm(&self, timer: u8) -> Option<&PwmConfig> {
        self.pwm.get(&timer)
    }

    pub fn pwm_active(&self) -> usize {
        self.pwm.len()
    }

    /// Conversions performed so far on `source`.
    pub fn adc_reads(&self, source: &str) -> u32 {
        self.adc_reads.get(source).copied().unwrap_or(0)
    }

    fn line(&mut self, pin: &str) -> Result<&mut SimPin, BoardError> {
        self.pins
            .get_mut(pin)
            .ok_or_else(|| BoardError::UnknownPin(pin.into()))
    }
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// Pins ramp through ten steps; internal channels read nominal values.
fn default_signal(source: &AdcSource, n: u32) -> f64 {
    match source {
        AdcSource::Pin(_) => 1000.0 + 10.0 * f64::from(n % 10),
        AdcSource::VBat => 3.3,
        AdcSource::Temp => 25.0,
        AdcSource::VRef => 1.21,
        AdcSource::Vdd => 3.3,
    }
}

impl BoardPort for SimBoard {
    fn set_led(&mut self, led: Led, on: bool) {
        let pin = &mut self.leds[usize::from(led.id() - 1)];
        let Ok(()) = if on { pin.set_high() } else { pin.set_low() };
    }

    fn configure_pin(&mut self, pin: &str, mode: PinMode, pull: Pull) -> Result<(), BoardError> {
        let line = self.line(pin)?;
        line.mode = Some(mode);
        line.pull = pull;
        let Ok(()) = line.set_low();
        Ok(())
    }

    fn release_pin(&mut self, pin: &str) {
        if let Ok(line) = self.line(pin) {
            line.release();
        }
        self.pwm.retain(|_, cfg| cfg.pin != pin);
    }

    fn read_pin(&mut self, pin: &str) -> Result<bool, BoardError> {
        let line = self.line(pin)?;
        if line.mode.is_none() {
            return Err(BoardError::WrongMode(pin.into()));
        }
        let Ok(high) = line.is_high();
        Ok(high)
    }

    fn write_pin(&mut self, pin: &str, high: bool) -> Result<(), BoardError> {
        let line = self.line(pin)?;
        if !line.mode.is_some_and(PinMode::is_output) {
            return Err(BoardError::WrongMode(pin.into()));
        }
        let Ok(()) = if high { line.set_high() } else { line.set_low() };
        Ok(())
    }

    fn read_adc(&mut self, source: &AdcSource) -> Result<f64, BoardError> {
        if let AdcSource::Pin(pin) = source {
            if !ADC_VALID_PINS.contains(&pin.as_str()) {
                return Err(BoardError::UnknownPin(pin.clone()));
            }
        }
        let count = self.adc_reads.entry(source.name().to_owned()).or_insert(0);
        let n = *count;
        *count += 1;
        Ok((self.signal)(source, n))
    }

    fn start_pwm(&mut self, config: &PwmConfig) -> Result<(), BoardError> {
        if !PWM_TIMERS.contains(&config.timer) || !PWM_CHANNELS.contains(&config.channel) {
            return Err(BoardError::PwmUnavailable {
                timer: config.timer,
                channel: config.channel,
            });
        }
        if !self.pin_mode(&config.pin).is_some_and(PinMode::is_output) {
            return Err(BoardError::WrongMode(config.pin.clone()));
        }
        self.pwm.insert(config.timer, config.clone());
        Ok(())
    }

    fn stop_pwm(&mut self, timer: u8) {
        self.pwm.remove(&timer);
    }

    fn unique_id(&self) -> heapless::Vec<u8, 16> {
        self.uid.iter().copied().collect()
    }

    fn uname(&self) -> Uname {
        Uname {
            sysname: "boardlink-sim".into(),
            nodename: "boardlink-sim".into(),
            release: env!("CARGO_PKG_VERSION").into(),
            version: format!("v{} simulated", env!("CARGO_PKG_VERSION")),
            machine: "SimBoard with 4 LEDs".into(),
        }
    }
}
