//! boardlink: request/response RPC over a text-execution channel.
//!
//! The device runs a [`Dispatcher`](app::server::Dispatcher) draining a
//! bounded command queue into named handlers that post results to a
//! bounded result queue.  The host [`Client`](host::Client) submits code
//! text through a [`Transport`](rpc::transport::Transport) and polls the
//! result queue until the matching record appears.
//!
//! Board access goes through [`BoardPort`](app::ports::BoardPort);
//! [`adapters`] provides a simulated board and an in-process loopback
//! transport.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod host;
pub mod rpc;

pub use error::{Result, RpcError, TransportError};
pub use host::{Client, IntoOutcome};
