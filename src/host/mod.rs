//! Host side: the correlator and its typed API.

pub mod api;
pub mod client;

pub use api::PwmRequest;
pub use client::{Client, IntoOutcome};
