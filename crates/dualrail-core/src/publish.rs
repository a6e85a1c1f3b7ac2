//! Host-side result sink.

use crate::executor::RawValue;
use crate::verdict::Outcome;
use serde::Serialize;
use serde_json::{Map, Value};

/// The two capabilities a step needs from its host.
pub trait ResultSink {
    /// Receives a flat single-field record, e.g. `{"Current": 0.523}`.
    fn publish(&mut self, name: &str, payload: &Map<String, Value>);

    fn set_verdict(&mut self, step: &str, outcome: Outcome);
}

/// Emits `{name: value}` when `enabled`. Publishing does not depend on the
/// verdict: a failing step can still publish and a passing one may not.
pub fn maybe_publish<S: ResultSink + ?Sized>(
    sink: &mut S,
    name: &str,
    value: &RawValue,
    enabled: bool,
) -> bool {
    if !enabled {
        return false;
    }
    let mut payload = Map::new();
    payload.insert(name.to_string(), to_json(value));
    sink.publish(name, &payload);
    true
}

fn to_json(value: &RawValue) -> Value {
    match value {
        RawValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            // NaN and infinities have no JSON form
            .unwrap_or_else(|| Value::String(n.to_string())),
        RawValue::Integer(i) => Value::from(*i),
        RawValue::Bool(b) => Value::Bool(*b),
        RawValue::Text(s) => Value::String(s.clone()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Published {
    pub name: String,
    pub payload: Map<String, Value>,
}

/// Collects everything in memory; used by the runner and in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub published: Vec<Published>,
    pub verdicts: Vec<(String, Outcome)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verdict_of(&self, step: &str) -> Option<Outcome> {
        self.verdicts
            .iter()
            .rev()
            .find(|(name, _)| name == step)
            .map(|(_, outcome)| *outcome)
    }
}

impl ResultSink for MemorySink {
    fn publish(&mut self, name: &str, payload: &Map<String, Value>) {
        self.published.push(Published {
            name: name.to_string(),
            payload: payload.clone(),
        });
    }

    fn set_verdict(&mut self, step: &str, outcome: Outcome) {
        self.verdicts.push((step.to_string(), outcome));
    }
}

/// Forwards results to the `tracing` pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ResultSink for TracingSink {
    fn publish(&mut self, name: &str, payload: &Map<String, Value>) {
        let payload = Value::Object(payload.clone());
        tracing::info!(event = "publish", name, payload = %payload);
    }

    fn set_verdict(&mut self, step: &str, outcome: Outcome) {
        tracing::info!(event = "verdict", step, %outcome);
    }
}
