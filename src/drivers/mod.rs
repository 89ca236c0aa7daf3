//! Execution helpers for handler tasks: thread spawning and blocking delays.

pub mod delay;
pub mod task;
