//! Transport abstraction: any channel that can run code text on the
//! device and hand back what it printed.
//!
//! Concrete implementations:
//! - serial line into the board's raw code-execution mode (external)
//! - [`LoopbackTransport`](crate::adapters::loopback::LoopbackTransport),
//!   an in-process simulated device
//!
//! The host correlator is generic over `Transport`, so adding a new
//! transport requires zero changes to the correlation logic.

use crate::error::TransportError;

/// Text-in, bytes-out execution channel.
pub trait Transport {
    /// Switch the device into raw execution mode.
    fn enter_raw(&mut self) -> Result<(), TransportError>;

    /// Leave raw execution mode.
    fn exit_raw(&mut self) -> Result<(), TransportError>;

    /// Execute `code` and return everything it printed.
    ///
    /// Output written to the device's error stream is reported as
    /// [`TransportError::Remote`].
    fn exec(&mut self, code: &str) -> Result<Vec<u8>, TransportError>;
}

/// A transport with nothing on the other end.
/// Useful as a default before a board is attached.
pub struct NullTransport;

impl Transport for NullTransport {
    fn enter_raw(&mut self) -> Result<(), TransportError> {
        Err(TransportError::NotConnected)
    }

    fn exit_raw(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn exec(&mut self, _code: &str) -> Result<Vec<u8>, TransportError> {
        Err(TransportError::NotConnected)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn enter_raw(&mut self) -> Result<(), TransportError> {
        (**self).enter_raw()
    }

    fn exit_raw(&mut self) -> Result<(), TransportError> {
        (**self).exit_raw()
    }

    fn exec(&mut self, code: &str) -> Result<Vec<u8>, TransportError> {
        (**self).exec(code)
    }
}
