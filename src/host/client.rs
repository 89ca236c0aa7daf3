//! Host correlator: submit a command, then poll until its result shows up.
//!
//! ```text
//!   invoke("adc_read", args)
//!     │  lock session ─────────────────────────────────────────┐
//!     ├─▶ exec  boardlink_main.server.cmd({...})               │
//!     │     └─ transport fault ──▶ Err(Transport), no retry    │
//!     ├─▶ loop (retries, default 5)                            │ held for
//!     │     sleep poll_interval                                │ the whole
//!     │     exec  boardlink_main.server.ret(method='adc_read') │ request
//!     │       ├─ `_debug` records  → log, budget untouched     │
//!     │       └─ matching record   → done                      │
//!     └─▶ budget spent ──▶ Err(Timeout)                        │
//!        unlock ───────────────────────────────────────────────┘
//! ```
//!
//! One [`Client`] can be shared by many threads; its session guard keeps
//! every request's submit and polls together so callers never steal each
//! other's results.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use log::{debug, error, info, warn};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{Result, RpcError};
use crate::rpc::literal::{self, quote, to_literal};
use crate::rpc::record::{Args, Command, ResultRecord, Tagged};
use crate::rpc::transport::Transport;

/// Host side of the protocol over any [`Transport`].
pub struct Client<T> {
    session: Mutex<T>,
    config: ClientConfig,
}

/// Whether a fetch removes what it returns.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Fetch {
    Take,
    Peek,
}

/// Which records end a polling loop.
#[derive(Clone, Copy)]
enum Want<'a> {
    Method(&'a str),
    Any,
}

impl Want<'_> {
    fn matches(self, record: &ResultRecord) -> bool {
        match self {
            Want::Method(m) => record.method == m,
            Want::Any => true,
        }
    }
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    /// A zero retry budget is raised to one attempt.
    pub fn with_config(transport: T, mut config: ClientConfig) -> Self {
        if config.retries == 0 {
            warn!("HOST: retries = 0 would never poll, using 1");
            config.retries = 1;
        }
        Self {
            session: Mutex::new(transport),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Give the transport back.
    pub fn into_inner(self) -> T {
        self.session
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self) -> Result<MutexGuard<'_, T>> {
        self.session.lock().map_err(|_| RpcError::SessionPoisoned)
    }

    // ── Raw access ────────────────────────────────────────────

    /// Run `cmds` (joined by newlines) and decode whatever they print.
    ///
    /// `enter`/`exit` wrap the exchange in raw-mode framing.  Output is
    /// decoded as a host literal; no output yields an empty list.
    pub fn server_cmd<S: AsRef<str>>(&self, cmds: &[S], enter: bool, exit: bool) -> Result<Value> {
        let code = cmds.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\n");
        let mut session = self.session()?;
        exchange(&mut *session, &code, enter, exit)
    }

    /// Enter raw mode and import the server module.
    pub fn start_server(&self) -> Result<()> {
        let code = format!("import {}", self.config.server_module);
        let mut session = self.session()?;
        exchange(&mut *session, &code, true, false)?;
        info!("HOST: server '{}' started", self.config.server_module);
        Ok(())
    }

    /// Leave raw mode.
    pub fn close(&self) -> Result<()> {
        self.session()?.exit_raw()?;
        info!("HOST: session closed");
        Ok(())
    }

    // ── Correlated calls ──────────────────────────────────────

    /// Submit `method(args)` and wait for its first result.
    ///
    /// The returned record may itself report `success: false`; `Err` is
    /// reserved for transport, timeout, decode and consistency failures.
    pub fn invoke(&self, method: &str, args: Args) -> Result<ResultRecord> {
        let module = &self.config.server_module;
        let command = Command::new(method, args);
        let submit = format!("{module}.server.cmd({})", to_literal(&command.to_value()));
        let fetch = format!("{module}.server.ret(method={}, all=False)", quote(method));

        let mut session = self.session()?;
        exchange(&mut *session, &submit, false, false)?;

        let mut found = self
            .poll(&mut *session, &fetch, Want::Method(method), Fetch::Take)
            .map_err(|e| match e {
                RpcError::NotFound { method } => RpcError::Timeout { method },
                other => other,
            })?;
        if found.len() > 1 {
            error!(
                "HOST: more results than expected for {}: {:?}",
                method, found
            );
            return Err(RpcError::Consistency {
                method: method.into(),
                count: found.len(),
            });
        }
        Ok(found.remove(0))
    }

    /// Remove and return `method`'s result (or all of them).
    pub fn get_server_method(&self, method: &str, all: bool) -> Result<Vec<ResultRecord>> {
        let fetch = format!(
            "{}.server.ret(method={}, all={})",
            self.config.server_module,
            quote(method),
            to_literal(&Value::Bool(all))
        );
        let mut session = self.session()?;
        self.poll(&mut *session, &fetch, Want::Method(method), Fetch::Take)
    }

    /// Like [`get_server_method`](Self::get_server_method) but leaves the
    /// records queued.  `None` matches any non-diagnostic record.
    pub fn peek_server_method(&self, method: Option<&str>, all: bool) -> Result<Vec<ResultRecord>> {
        let filter = method.map_or_else(|| "None".to_owned(), quote);
        let fetch = format!(
            "{}.server.peek(method={}, all={})",
            self.config.server_module,
            filter,
            to_literal(&Value::Bool(all))
        );
        let want = method.map_or(Want::Any, Want::Method);
        let mut session = self.session()?;
        self.poll(&mut *session, &fetch, want, Fetch::Peek)
    }

    /// Fetch with `code` until a wanted record appears or the retry
    /// budget runs out.  Returns the non-diagnostic records of the
    /// successful fetch.
    ///
    /// A taking fetch that drained diagnostics keeps its budget, since the
    /// next fetch sees past them.  A peek sees the same diagnostics every
    /// time, so every peek spends one attempt.
    fn poll(
        &self,
        session: &mut T,
        code: &str,
        want: Want<'_>,
        fetch: Fetch,
    ) -> Result<Vec<ResultRecord>> {
        let mut budget = self.config.retries;
        while budget > 0 {
            thread::sleep(self.config.poll_interval());
            let reply = exchange(session, code, false, false)?;
            let records: Vec<ResultRecord> = serde_json::from_value(reply).map_err(|e| {
                error!("HOST: reply is not a result list: {}", e);
                RpcError::Decode(e.to_string())
            })?;

            let (diagnostics, records): (Vec<_>, Vec<_>) =
                records.into_iter().partition(Tagged::is_diagnostic);
            for d in &diagnostics {
                debug!("HOST: DEVICE DEBUG: {}", display_value(&d.value));
            }

            let found: Vec<_> = records.into_iter().filter(|r| want.matches(r)).collect();
            if !found.is_empty() {
                return Ok(found);
            }
            if fetch == Fetch::Peek || diagnostics.is_empty() {
                budget -= 1;
            }
        }
        let method = match want {
            Want::Method(m) => m.to_owned(),
            Want::Any => "any".to_owned(),
        };
        Err(RpcError::NotFound { method })
    }
}

/// One framed exec plus decode.
fn exchange<T: Transport + ?Sized>(
    transport: &mut T,
    code: &str,
    enter: bool,
    exit: bool,
) -> Result<Value> {
    debug!("HOST: exec {}", code);
    if enter {
        transport.enter_raw()?;
    }
    let raw = transport.exec(code).map_err(|e| {
        error!("HOST: {}: {}", code, e);
        RpcError::Transport(e)
    })?;
    if exit {
        transport.exit_raw()?;
    }

    let text = String::from_utf8(raw).map_err(|e| {
        error!("HOST: reply is not UTF-8: {}", e);
        RpcError::Decode(e.to_string())
    })?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(Value::Array(Vec::new()));
    }
    debug!("HOST: reply {}", text);
    literal::decode(text).map_err(|e| {
        error!("HOST: undecodable reply ({}): {}", e, text);
        RpcError::Decode(e.to_string())
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Outcome flattening ────────────────────────────────────────

/// Collapse a host call into the `(success, result)` pair.
pub trait IntoOutcome {
    fn into_outcome(self) -> (bool, Value);
}

impl IntoOutcome for Result<ResultRecord> {
    fn into_outcome(self) -> (bool, Value) {
        match self {
            Ok(record) => (record.success, record.to_value()),
            Err(e) => e.into_outcome(),
        }
    }
}

impl IntoOutcome for Result<Value> {
    fn into_outcome(self) -> (bool, Value) {
        match self {
            Ok(value) => (true, value),
            Err(e) => e.into_outcome(),
        }
    }
}

impl IntoOutcome for Result<Vec<ResultRecord>> {
    fn into_outcome(self) -> (bool, Value) {
        match self {
            Ok(records) => (
                true,
                Value::Array(records.iter().map(ResultRecord::to_value).collect()),
            ),
            Err(e) => e.into_outcome(),
        }
    }
}
