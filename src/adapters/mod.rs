//! Adapters: concrete implementations of the port and transport traits.
//!
//! | Adapter     | Implements | Connects to                          |
//! |-------------|------------|--------------------------------------|
//! | `loopback`  | Transport  | In-process console + dispatcher      |
//! | `sim_board` | BoardPort  | Simulated LEDs, GPIO, ADC and timers |

pub mod loopback;
pub mod sim_board;
