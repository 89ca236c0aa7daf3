//! Loopback transport: a simulated device running in-process.
//!
//! [`SimDevice`] boots a [`Dispatcher`] on its own thread and hands out
//! [`LoopbackTransport`]s that feed code text straight into a
//! [`Console`].  The host client cannot tell it apart from a board on a
//! serial line, which makes it the backbone of the simulator binary and
//! the end-to-end tests.
//!
//! ```text
//!   Client ──exec──▶ LoopbackTransport ──▶ Console ──▶ ServerHandle
//!                                                          │
//!                                     dispatcher thread ◀──┘
//! ```

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use log::{info, warn};

use crate::app::console::Console;
use crate::app::handlers::TaskDelay;
use crate::app::ports::{BoardPort, SharedBoard};
use crate::app::server::{Dispatcher, ServerHandle};
use crate::config::ServerConfig;
use crate::drivers::task;
use crate::error::TransportError;
use crate::rpc::transport::Transport;

// ── SimDevice ─────────────────────────────────────────────────

/// A running device server with a simulated board.
pub struct SimDevice<B> {
    handle: ServerHandle,
    board: SharedBoard<B>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl<B: BoardPort> SimDevice<B> {
    /// Start the dispatcher thread.
    pub fn boot<D: TaskDelay>(board: B, delay: D, config: ServerConfig) -> io::Result<Self> {
        let stack_kb = config.task_stack_kb;
        let mut dispatcher = Dispatcher::new(board, delay, config);
        let handle = dispatcher.handle();
        let board = dispatcher.board();

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = task::spawn("dispatcher", stack_kb, move || dispatcher.run(&stop_flag))?;
        info!("SIM: device booted");

        Ok(Self {
            handle,
            board,
            stop,
            thread: Some(thread),
        })
    }

    /// A transport whose console imports the server as `module`.
    pub fn transport(&self, module: &str) -> LoopbackTransport {
        LoopbackTransport::new(Console::new(self.handle.clone(), module))
    }

    pub fn handle(&self) -> &ServerHandle {
        &self.handle
    }

    pub fn board(&self) -> SharedBoard<B> {
        Arc::clone(&self.board)
    }

    /// Stop the dispatcher and every handler task, and wait for them.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }
}

impl<B> SimDevice<B> {
    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("SIM: dispatcher thread panicked");
            }
            info!("SIM: device stopped");
        }
    }
}

impl<B> Drop for SimDevice<B> {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

// ── LoopbackTransport ─────────────────────────────────────────

/// [`Transport`] that executes code on an in-process [`Console`].
pub struct LoopbackTransport {
    console: Console,
    raw: bool,
}

impl LoopbackTransport {
    pub fn new(console: Console) -> Self {
        Self {
            console,
            raw: false,
        }
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }

    pub fn console(&self) -> &Console {
        &self.console
    }
}

impl Transport for LoopbackTransport {
    fn enter_raw(&mut self) -> Result<(), TransportError> {
        self.raw = true;
        Ok(())
    }

    fn exit_raw(&mut self) -> Result<(), TransportError> {
        self.raw = false;
        Ok(())
    }

    fn exec(&mut self, code: &str) -> Result<Vec<u8>, TransportError> {
        if !self.raw {
            return Err(TransportError::Io("device is not in raw mode".into()));
        }
        self.console
            .exec(code)
            .map(String::into_bytes)
            .map_err(TransportError::Remote)
    }
}
