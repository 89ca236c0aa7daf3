//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one side of the
//! protocol against mock adapters.  Everything runs in-process; no board
//! or serial port is required.

mod console_tests;
mod correlator_tests;
mod dispatcher_tests;
mod mock_board;
mod mock_transport;
