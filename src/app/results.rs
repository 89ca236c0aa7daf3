//! Shared handle on the outbound result queue.
//!
//! The dispatcher, every spawned handler task and the console all write
//! or drain the same queue.  [`ResultSink`] is the only way to reach it:
//! each method takes the lock for one queue operation and releases it
//! before returning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use serde_json::Value;

use super::lock;
use crate::rpc::queue::BoundedQueue;
use crate::rpc::record::ResultRecord;

#[derive(Debug, Clone, Default)]
pub struct ResultSink {
    queue: Arc<Mutex<BoundedQueue<ResultRecord>>>,
    debug: Arc<AtomicBool>,
}

impl ResultSink {
    pub fn new(debug: bool) -> Self {
        Self {
            queue: Arc::default(),
            debug: Arc::new(AtomicBool::new(debug)),
        }
    }

    pub fn post(&self, record: ResultRecord) -> bool {
        let accepted = lock(&self.queue).put(record);
        if !accepted {
            warn!("RPC: result queue overflow, oldest result dropped");
        }
        accepted
    }

    pub fn ok(&self, method: &str, value: Value) -> bool {
        self.post(ResultRecord::ok(method, value))
    }

    pub fn err(&self, method: &str, msg: impl Into<String>) -> bool {
        let msg = msg.into();
        debug!("RPC: {} failed: {}", method, msg);
        self.post(ResultRecord::err(method, msg))
    }

    /// Post a `_debug` record if the device debug flag is set.
    ///
    /// Text is formatted `origin:handler: message`.
    pub fn diagnostic(&self, origin: &str, handler: &str, msg: &str) {
        if self.debug_enabled() {
            self.post(ResultRecord::diagnostic(format!("{origin}:{handler}: {msg}")));
        }
    }

    /// Replace the first record with the same method, or append it.
    pub fn update(&self, record: ResultRecord) -> bool {
        lock(&self.queue).update(record)
    }

    pub fn get(&self, method: Option<&str>, all: bool) -> Vec<ResultRecord> {
        lock(&self.queue).get(method, all)
    }

    pub fn peek(&self, method: Option<&str>, all: bool) -> Vec<ResultRecord> {
        lock(&self.queue).peek(method, all)
    }

    pub fn len(&self) -> usize {
        lock(&self.queue).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_debug(&self, on: bool) {
        self.debug.store(on, Ordering::Relaxed);
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }
}
