//! Device server: submission gate and dispatcher loop.
//!
//! ```text
//!  console ──cmd──▶ ServerHandle ──gate──▶ command queue
//!                        │                       │ pop oldest
//!                        │                       ▼
//!                        │                  Dispatcher ──▶ HandlerSet
//!                        │                                     │
//!  console ◀──ret/peek── ResultSink ◀──────────────────────────┘
//! ```
//!
//! [`Dispatcher`] owns the handler set and the shared context and runs on
//! its own thread.  [`ServerHandle`] is the cloneable front door used by
//! the console: it validates submissions, queues commands and reads the
//! result queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use log::{debug, info, warn};
use serde_json::{Map, Value};

use super::context::SharedContext;
use super::handlers::{GATE_METHOD, HandlerEnv, HandlerSet, TaskDelay};
use super::lock;
use super::ports::{BoardPort, SharedBoard};
use super::results::ResultSink;
use crate::config::ServerConfig;
use crate::rpc::literal::to_literal;
use crate::rpc::queue::BoundedQueue;
use crate::rpc::record::{Command, ResultRecord};

type CommandQueue = Arc<Mutex<BoundedQueue<Command>>>;

// ───────────────────────────────────────────────────────────────
// ServerHandle
// ───────────────────────────────────────────────────────────────

/// Entry points reachable from the console.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    commands: CommandQueue,
    results: ResultSink,
    methods: Arc<[&'static str]>,
}

impl ServerHandle {
    /// Submit a `{method, args}` mapping.
    ///
    /// Rejected payloads post a failed result tagged `cmd` and return
    /// `false` without touching the command queue.
    pub fn cmd(&self, payload: &Value) -> bool {
        let Some(map) = payload.as_object() else {
            return self.reject("cmd must be a dict");
        };
        let method = match map.get("method") {
            None | Some(Value::Null | Value::Bool(false)) => {
                return self.reject("cmd dict must have method key");
            }
            Some(Value::String(m)) if m.is_empty() => {
                return self.reject("cmd dict must have method key");
            }
            Some(Value::String(m)) if self.has_method(m) => m.clone(),
            Some(Value::String(m)) => return self.reject(format!("'{m}' invalid method")),
            Some(other) => return self.reject(format!("'{}' invalid method", to_literal(other))),
        };
        let args = match map.get("args") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(args)) => args.clone(),
            Some(_) => return self.reject("cmd args must be a dict"),
        };

        debug!("RPC: queued '{}'", method);
        if !lock(&self.commands).put(Command::new(method, args)) {
            warn!("RPC: command queue overflow, oldest command dropped");
        }
        true
    }

    /// Remove and return results.  See [`BoundedQueue::get`].
    pub fn ret(&self, method: Option<&str>, all: bool) -> Vec<ResultRecord> {
        self.results.get(method, all)
    }

    /// Read results without removing them.
    pub fn peek(&self, method: Option<&str>, all: bool) -> Vec<ResultRecord> {
        self.results.peek(method, all)
    }

    /// Replace the first result with the same method, or append it.
    pub fn update(&self, record: ResultRecord) -> bool {
        self.results.update(record)
    }

    pub fn results(&self) -> &ResultSink {
        &self.results
    }

    pub fn pending_commands(&self) -> usize {
        lock(&self.commands).len()
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| *m == name)
    }

    fn reject(&self, msg: impl Into<String>) -> bool {
        self.results.err(GATE_METHOD, msg);
        false
    }
}

// ───────────────────────────────────────────────────────────────
// Dispatcher
// ───────────────────────────────────────────────────────────────

/// Single cooperative loop draining the command queue.
pub struct Dispatcher<B, D> {
    commands: CommandQueue,
    handlers: HandlerSet<B, D>,
    env: HandlerEnv<B, D>,
    config: ServerConfig,
}

impl<B: BoardPort, D: TaskDelay> Dispatcher<B, D> {
    /// Dispatcher with the standard handler set.
    pub fn new(board: B, delay: D, config: ServerConfig) -> Self {
        Self::with_handlers(board, delay, HandlerSet::standard(), config)
    }

    /// Dispatcher with a caller-built handler set.  The board is
    /// quiesced before the first command runs.
    pub fn with_handlers(
        board: B,
        delay: D,
        handlers: HandlerSet<B, D>,
        config: ServerConfig,
    ) -> Self {
        let sink = ResultSink::new(config.debug);
        let board = Arc::new(Mutex::new(board));
        let mut env = HandlerEnv::new(board, sink, delay, config.task_stack_kb);
        env.quiesce();
        info!(
            "RPC: server ready with {} handlers (debug={})",
            handlers.len(),
            config.debug
        );
        Self {
            commands: Arc::default(),
            handlers,
            env,
            config,
        }
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            commands: Arc::clone(&self.commands),
            results: self.env.sink.clone(),
            methods: self.handlers.names().collect(),
        }
    }

    pub fn board(&self) -> SharedBoard<B> {
        Arc::clone(&self.env.board)
    }

    pub fn context(&self) -> &SharedContext {
        &self.env.ctx
    }

    pub fn results(&self) -> &ResultSink {
        &self.env.sink
    }

    /// Pop at most one command and run its handler.
    ///
    /// Returns the dispatched method name, or `None` when the queue was
    /// empty.
    pub fn step(&mut self) -> Option<String> {
        let command = lock(&self.commands).get(None, false).into_iter().next()?;
        match self.handlers.get(&command.method) {
            Some(handler) => {
                debug!("RPC: dispatch '{}'", command.method);
                handler(&mut self.env, &command.args);
            }
            None => debug!("RPC: no handler for '{}', skipped", command.method),
        }
        Some(command.method)
    }

    /// Step until the command queue is empty.  Returns how many commands ran.
    pub fn run_pending(&mut self) -> usize {
        let mut n = 0;
        while self.step().is_some() {
            n += 1;
        }
        n
    }

    /// Step, sleep, repeat until `stop` is raised; then shut down.
    pub fn run(&mut self, stop: &AtomicBool) {
        info!(
            "RPC: dispatcher running (sleep={}ms)",
            self.config.dispatch_sleep_ms
        );
        while !stop.load(Ordering::Acquire) {
            self.step();
            thread::sleep(self.config.dispatch_sleep());
        }
        self.shutdown();
    }

    /// Wait for spawned handler tasks to exit.
    pub fn join_tasks(&mut self) {
        self.env.join_tasks();
    }

    pub fn active_tasks(&self) -> usize {
        self.env.active_tasks()
    }

    /// Signal every running task to stop and wait for them.
    pub fn shutdown(&mut self) {
        let stopped = self.env.ctx.stop_all();
        self.env.join_tasks();
        info!("RPC: dispatcher stopped ({} task(s) signalled)", stopped);
    }
}
