//! Console: the text surface the host talks to.
//!
//! The host never calls the server directly; it sends statements through
//! the transport and reads back whatever they print.  The console accepts
//! exactly the statements the correlator emits:
//!
//! ```text
//! import boardlink_main
//! boardlink_main.server.cmd({'method': 'adc_read', 'args': {'pin': 'X2'}})
//! boardlink_main.server.ret(method='adc_read', all=False)
//! boardlink_main.server.peek(method=None, all=True)
//! boardlink_main.server.update({'method': 'x', 'value': {}, 'success': True})
//! ```
//!
//! Statements are separated by newlines or `;`.  `ret` and `peek` print
//! their record list in host-literal syntax; the other calls print
//! nothing.  Anything else is reported as error-stream text.

use log::{debug, info};
use serde_json::Value;

use super::server::ServerHandle;
use crate::rpc::literal::{self, split_top_level, to_literal};
use crate::rpc::record::ResultRecord;

pub struct Console {
    handle: ServerHandle,
    module: String,
    imported: bool,
}

impl Console {
    pub fn new(handle: ServerHandle, module: impl Into<String>) -> Self {
        Self {
            handle,
            module: module.into(),
            imported: false,
        }
    }

    /// Whether the server module has been imported.
    pub fn is_started(&self) -> bool {
        self.imported
    }

    pub fn handle(&self) -> &ServerHandle {
        &self.handle
    }

    /// Run `code` and return what it printed.
    ///
    /// On failure the `Err` carries error-stream text; statements before
    /// the failing one have already taken effect.
    pub fn exec(&mut self, code: &str) -> Result<String, String> {
        let mut out = String::new();
        for line in code.lines() {
            for stmt in split_top_level(line, ';') {
                self.statement(stmt.trim(), &mut out)?;
            }
        }
        Ok(out)
    }

    fn statement(&mut self, stmt: &str, out: &mut String) -> Result<(), String> {
        if stmt.is_empty() || stmt.starts_with('#') {
            return Ok(());
        }
        if let Some(module) = stmt.strip_prefix("import ") {
            let module = module.trim();
            if module != self.module {
                return Err(format!("ImportError: no module named '{module}'"));
            }
            if !self.imported {
                info!("RPC: console imported {}", self.module);
            }
            self.imported = true;
            return Ok(());
        }

        let Some(call) = stmt
            .strip_prefix(self.module.as_str())
            .and_then(|rest| rest.strip_prefix(".server."))
        else {
            return Err(format!("SyntaxError: unsupported statement: {stmt}"));
        };
        if !self.imported {
            return Err(format!("NameError: name '{}' isn't defined", self.module));
        }

        let (name, args) = split_call(call)?;
        debug!("RPC: console {}({})", name, args);
        match name {
            "cmd" => {
                self.handle.cmd(&single_arg(args)?);
            }
            "update" => {
                let record: ResultRecord = serde_json::from_value(single_arg(args)?)
                    .map_err(|e| format!("TypeError: update expects a result mapping: {e}"))?;
                self.handle.update(record);
            }
            "ret" | "peek" => {
                let (method, all) = fetch_args(args)?;
                let records = if name == "ret" {
                    self.handle.ret(method.as_deref(), all)
                } else {
                    self.handle.peek(method.as_deref(), all)
                };
                let list = Value::Array(records.iter().map(ResultRecord::to_value).collect());
                out.push_str(&to_literal(&list));
                out.push('\n');
            }
            other => {
                return Err(format!(
                    "AttributeError: 'Server' object has no attribute '{other}'"
                ));
            }
        }
        Ok(())
    }
}

/// `name(args)` → (`name`, `args`).
fn split_call(call: &str) -> Result<(&str, &str), String> {
    let (name, rest) = call
        .split_once('(')
        .ok_or_else(|| format!("SyntaxError: expected a call: {call}"))?;
    let args = rest
        .strip_suffix(')')
        .ok_or_else(|| format!("SyntaxError: unclosed call: {call}"))?;
    Ok((name.trim(), args))
}

fn parse_value(text: &str) -> Result<Value, String> {
    literal::decode(text).map_err(|e| format!("SyntaxError: {e}"))
}

fn single_arg(args: &str) -> Result<Value, String> {
    if args.trim().is_empty() {
        return Err("TypeError: function takes 1 positional argument but 0 were given".into());
    }
    parse_value(args)
}

/// `method=..., all=...` in keyword or positional form.
fn fetch_args(args: &str) -> Result<(Option<String>, bool), String> {
    let mut method = None;
    let mut all = false;

    let parts = split_top_level(args, ',');
    let parts = parts.iter().map(|p| p.trim()).filter(|p| !p.is_empty());
    for (i, part) in parts.enumerate() {
        let (key, value) = match part.split_once('=') {
            Some((k, v)) if is_identifier(k.trim()) => (k.trim(), v.trim()),
            _ => match i {
                0 => ("method", part),
                1 => ("all", part),
                _ => return Err("TypeError: too many positional arguments".into()),
            },
        };
        match (key, parse_value(value)?) {
            ("method", Value::Null) => method = None,
            ("method", Value::String(m)) => method = Some(m),
            ("all", Value::Bool(b)) => all = b,
            ("method" | "all", other) => {
                return Err(format!(
                    "TypeError: bad value for {key}: {}",
                    to_literal(&other)
                ));
            }
            (other, _) => {
                return Err(format!("TypeError: unexpected keyword argument '{other}'"));
            }
        }
    }
    Ok((method, all))
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
