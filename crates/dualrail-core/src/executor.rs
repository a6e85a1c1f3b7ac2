//! Generic command/query executor driven by [`NodeDescriptor`]s.

use crate::catalog::{NodeDescriptor, ResponseKind, Slot};
use crate::errors::{ExecError, ExecResult};
use crate::instrument::Instrument;
use crate::timeout::TimeoutScope;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Command,
    Query,
}

/// Per-invocation settings. A call is either a command or a query, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub mode: Mode,
    pub timeout_override_ms: Option<u32>,
    /// Index for nodes such as `ISUMmary<n>`.
    pub suffix: Option<u32>,
}

impl CallContext {
    pub fn command() -> Self {
        Self {
            mode: Mode::Command,
            timeout_override_ms: None,
            suffix: None,
        }
    }

    pub fn query() -> Self {
        Self {
            mode: Mode::Query,
            ..Self::command()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_override_ms = Some(timeout_ms);
        self
    }

    pub fn with_suffix(mut self, suffix: u32) -> Self {
        self.suffix = Some(suffix);
        self
    }
}

/// Decoded query response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Integer(i64),
    Bool(bool),
    Text(String),
}

impl RawValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            RawValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RawValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Number(n) => write!(f, "{}", n),
            RawValue::Integer(i) => write!(f, "{}", i),
            RawValue::Bool(b) => write!(f, "{}", b),
            RawValue::Text(s) => f.write_str(s),
        }
    }
}

/// Builds the program message for one call without touching the instrument.
pub fn format_line<P: AsRef<str>>(
    node: &NodeDescriptor,
    ctx: &CallContext,
    params: &[P],
) -> ExecResult<String> {
    let slots: &[Slot] = match ctx.mode {
        Mode::Command => node.command,
        Mode::Query => node.query.map(|q| q.params),
    }
    .ok_or(ExecError::UnsupportedMode {
        node: node.name,
        mode: ctx.mode,
    })?;

    let min = slots.iter().filter(|s| !s.optional).count();
    if params.len() < min || params.len() > slots.len() {
        return Err(ExecError::ParameterCount {
            node: node.name,
            mode: ctx.mode,
            min,
            max: slots.len(),
            got: params.len(),
        });
    }

    let header = node
        .render_header(ctx.suffix)
        .ok_or(ExecError::MissingSuffix { node: node.name })?;

    let mut line = header.into_owned();
    if ctx.mode == Mode::Query {
        line.push('?');
    }
    if !params.is_empty() {
        line.push(' ');
        let joined: Vec<&str> = params.iter().map(AsRef::as_ref).collect();
        line.push_str(&joined.join(","));
    }
    Ok(line)
}

/// Performs exactly one write (command) or one query against `instrument`.
///
/// The ambient I/O timeout is overridden for the duration of the call when
/// the context asks for it and is restored before this function returns,
/// whatever the outcome. Driver errors are returned as they came.
pub fn execute<I, P>(
    instrument: &mut I,
    node: &NodeDescriptor,
    ctx: &CallContext,
    params: &[P],
) -> ExecResult<Option<RawValue>>
where
    I: Instrument + ?Sized,
    P: AsRef<str>,
{
    let line = format_line(node, ctx, params)?;
    let mut scope = TimeoutScope::enter(instrument, ctx.timeout_override_ms);

    match ctx.mode {
        Mode::Command => {
            tracing::debug!(node = node.name, %line, "scpi write");
            scope.write(&line)?;
            Ok(None)
        }
        Mode::Query => {
            tracing::debug!(node = node.name, %line, "scpi query");
            let raw = scope.query(&line)?;
            // node.query is Some here, format_line checked it
            let expected = node.response().unwrap_or(ResponseKind::Text);
            let value = decode(expected, &raw).ok_or_else(|| ExecError::MalformedResponse {
                line: line.clone(),
                expected,
                raw: raw.clone(),
            })?;
            tracing::debug!(node = node.name, %value, "scpi response");
            Ok(Some(value))
        }
    }
}

/// Decodes SCPI response data as `kind`.
pub fn decode(kind: ResponseKind, raw: &str) -> Option<RawValue> {
    let raw = raw.trim();
    match kind {
        ResponseKind::Number => raw.parse::<f64>().ok().map(RawValue::Number),
        ResponseKind::Integer => raw
            .parse::<i64>()
            .ok()
            .or_else(|| {
                raw.parse::<f64>()
                    .ok()
                    .filter(|n| n.fract() == 0.0 && n.abs() < i64::MAX as f64)
                    .map(|n| n as i64)
            })
            .map(RawValue::Integer),
        ResponseKind::Bool => match raw.to_ascii_uppercase().as_str() {
            "1" | "+1" | "ON" => Some(RawValue::Bool(true)),
            "0" | "+0" | "OFF" => Some(RawValue::Bool(false)),
            _ => None,
        },
        ResponseKind::Text => Some(RawValue::Text(unquote(raw))),
    }
}

fn unquote(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        raw[1..raw.len() - 1].replace("\"\"", "\"")
    } else {
        raw.to_string()
    }
}
