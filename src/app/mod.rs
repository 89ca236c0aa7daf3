//! Device-resident server: pure dispatch logic over port traits.
//!
//! This module holds the command gate, the dispatcher loop, the handler
//! set and the console statement interpreter.  All interaction with the
//! board happens through [`ports::BoardPort`], keeping this layer fully
//! testable with a mock board and a no-op delay.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod console;
pub mod context;
pub mod handlers;
pub mod ports;
pub mod results;
pub mod server;

/// Lock a device-side mutex, recovering the data if a task panicked
/// while holding it.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
