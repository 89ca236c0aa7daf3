//! Transport-agnostic RPC substrate shared by host and device.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  Host                               Device                 │
//! │                                                            │
//! │  Client ──literal──▶ Transport ──▶ Console ──▶ cmd queue   │
//! │    ▲                                              │        │
//! │    │                                         Dispatcher    │
//! │    │                                              ▼        │
//! │  decode ◀──printed── Transport ◀── Console ◀── ret queue   │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod literal;
pub mod queue;
pub mod record;
pub mod transport;
