//! Device-wide mutable state owned by the dispatcher.
//!
//! Handlers mutate it inline during a dispatch step.  Spawned tasks never
//! see the context itself; they only get a clone of their own running
//! flag.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::ports::{AdcSource, PinMode, Pull};

/// A GPIO claimed by `init_gpio`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinEntry {
    pub pin: String,
    pub mode: PinMode,
    pub pull: Pull,
}

/// An active PWM timer started by `pwm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEntry {
    pub timer: u8,
    pub channel: u8,
    /// Registered GPIO name the timer drives.
    pub pin: String,
}

/// Arguments cached for a scheduled multi-channel ADC run.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiReadArgs {
    pub pins: Vec<AdcSource>,
    pub samples: u32,
    pub freq_hz: u32,
}

/// Registries keyed by logical name.
#[derive(Debug, Default)]
pub struct SharedContext {
    running: HashMap<String, Arc<AtomicBool>>,
    pub pins: HashMap<String, PinEntry>,
    pub timers: HashMap<String, TimerEntry>,
    pub multi_read: Option<MultiReadArgs>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh running flag for task `name`, raised.
    ///
    /// A previous flag under the same name is cleared first, so an old
    /// task can never keep running on a flag the new one owns.
    pub fn start_flag(&mut self, name: &str) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(true));
        if let Some(old) = self.running.insert(name.to_owned(), Arc::clone(&flag)) {
            old.store(false, Ordering::Release);
        }
        flag
    }

    /// Clear the flag for `name`.  Returns whether a task was running.
    pub fn stop(&mut self, name: &str) -> bool {
        self.running
            .remove(name)
            .is_some_and(|flag| flag.swap(false, Ordering::AcqRel))
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running
            .get(name)
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    /// Clear every running flag.  Returns how many tasks were signalled.
    pub fn stop_all(&mut self) -> usize {
        self.running
            .drain()
            .filter(|(_, flag)| flag.swap(false, Ordering::AcqRel))
            .count()
    }

    /// Names whose task is still running.
    pub fn running_names(&self) -> impl Iterator<Item = &str> {
        self.running
            .iter()
            .filter(|(_, flag)| flag.load(Ordering::Acquire))
            .map(|(name, _)| name.as_str())
    }

    /// Forget every registry entry.  Flags must be stopped separately.
    pub fn clear(&mut self) {
        self.running.clear();
        self.pins.clear();
        self.timers.clear();
        self.multi_read = None;
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
            && self.pins.is_empty()
            && self.timers.is_empty()
            && self.multi_read.is_none()
    }
}
