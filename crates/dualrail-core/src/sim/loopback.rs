use crate::instrument::{Instrument, InstrumentError, InstrumentResult};
use std::collections::VecDeque;

pub const DEFAULT_TIMEOUT_MS: u32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Write,
    Query,
}

/// One line sent to the loopback, with the timeout in effect at the time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub kind: ExchangeKind,
    pub line: String,
    pub timeout_ms: u32,
}

/// Scripted instrument: answers queries from a queue and records every
/// exchange and timeout change.
#[derive(Debug)]
pub struct LoopbackInstrument {
    responses: VecDeque<String>,
    transcript: Vec<Exchange>,
    timeout_ms: u32,
    timeout_history: Vec<u32>,
    failure: Option<String>,
}

impl Default for LoopbackInstrument {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackInstrument {
    pub fn new() -> Self {
        Self {
            responses: VecDeque::new(),
            transcript: Vec::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            timeout_history: Vec::new(),
            failure: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Queues a reply for the next query.
    pub fn respond(mut self, reply: impl Into<String>) -> Self {
        self.responses.push_back(reply.into());
        self
    }

    /// Every subsequent write and query fails with a transport error.
    pub fn fail_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn transcript(&self) -> &[Exchange] {
        &self.transcript
    }

    pub fn writes(&self) -> Vec<&str> {
        self.lines(ExchangeKind::Write)
    }

    pub fn queries(&self) -> Vec<&str> {
        self.lines(ExchangeKind::Query)
    }

    /// Every value passed to `set_io_timeout_ms`, in order.
    pub fn timeout_history(&self) -> &[u32] {
        &self.timeout_history
    }

    fn lines(&self, kind: ExchangeKind) -> Vec<&str> {
        self.transcript
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.line.as_str())
            .collect()
    }

    fn record(&mut self, kind: ExchangeKind, line: &str) -> InstrumentResult<()> {
        self.transcript.push(Exchange {
            kind,
            line: line.to_string(),
            timeout_ms: self.timeout_ms,
        });
        match &self.failure {
            Some(message) => Err(InstrumentError::transport(message.clone())),
            None => Ok(()),
        }
    }
}

impl Instrument for LoopbackInstrument {
    fn write(&mut self, line: &str) -> InstrumentResult<()> {
        self.record(ExchangeKind::Write, line)
    }

    fn query(&mut self, line: &str) -> InstrumentResult<String> {
        self.record(ExchangeKind::Query, line)?;
        self.responses.pop_front().ok_or(InstrumentError::Timeout {
            timeout_ms: self.timeout_ms,
        })
    }

    fn io_timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    fn set_io_timeout_ms(&mut self, timeout_ms: u32) {
        self.timeout_history.push(timeout_ms);
        self.timeout_ms = timeout_ms;
    }
}
