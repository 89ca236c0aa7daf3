//! Scripted transport for correlator tests.
//!
//! Replies are consumed in order, one per `exec`.  Once the script runs
//! out every exec prints an empty list, or with `echo` set, a successful
//! record for whatever method a `ret(...)` asks for.  Everything sent is
//! recorded.

use std::collections::VecDeque;

use boardlink::error::TransportError;
use boardlink::rpc::transport::Transport;

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    pub replies: VecDeque<Result<String, TransportError>>,
    pub sent: Vec<String>,
    pub raw: bool,
    pub enters: usize,
    pub echo: bool,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a printed reply.
    pub fn reply(mut self, text: &str) -> Self {
        self.replies.push_back(Ok(text.to_owned()));
        self
    }

    /// Queue a transport failure.
    pub fn fail(mut self, err: TransportError) -> Self {
        self.replies.push_back(Err(err));
        self
    }

    /// Answer every fetch with a matching record once the script is spent.
    pub fn echoing(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Statements that fetched results.
    pub fn polls(&self) -> usize {
        self.sent
            .iter()
            .filter(|s| s.contains(".ret(") || s.contains(".peek("))
            .count()
    }
}

impl Transport for ScriptedTransport {
    fn enter_raw(&mut self) -> Result<(), TransportError> {
        self.raw = true;
        self.enters += 1;
        Ok(())
    }

    fn exit_raw(&mut self) -> Result<(), TransportError> {
        self.raw = false;
        Ok(())
    }

    fn exec(&mut self, code: &str) -> Result<Vec<u8>, TransportError> {
        self.sent.push(code.to_owned());
        match self.replies.pop_front() {
            Some(reply) => reply.map(String::into_bytes),
            None if self.echo => Ok(echo_reply(code).into_bytes()),
            None => Ok(b"[]\n".to_vec()),
        }
    }
}

fn echo_reply(code: &str) -> String {
    let method = code
        .split_once(".ret(method='")
        .and_then(|(_, rest)| rest.split_once('\''))
        .map(|(m, _)| m);
    match method {
        Some(m) => format!("[{{'method': '{m}', 'value': {{}}, 'success': True}}]\n"),
        None => String::new(),
    }
}
