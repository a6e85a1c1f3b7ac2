//! Sequential plan execution.

use crate::executor::RawValue;
use crate::instrument::Instrument;
use crate::plan::Plan;
use crate::publish::ResultSink;
use crate::report::RunArtifacts;
use crate::verdict::{Outcome, PlanVerdict};
use serde::Serialize;
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pass,
    Fail,
    /// Command completed; nothing to judge.
    Done,
    Error,
    Skipped,
}

impl StepStatus {
    fn from_outcome(outcome: Outcome) -> Self {
        match outcome {
            Outcome::NotSet => StepStatus::Done,
            Outcome::Pass => StepStatus::Pass,
            Outcome::Fail => StepStatus::Fail,
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StepStatus::Pass => "pass",
            StepStatus::Fail => "fail",
            StepStatus::Done => "done",
            StepStatus::Error => "error",
            StepStatus::Skipped => "skipped",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub name: String,
    pub node: &'static str,
    /// Program message sent, empty when the step never got that far.
    pub line: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<RawValue>,
    pub published: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunPolicy {
    /// Skip the remaining steps after the first fail or error.
    pub stop_on_error: bool,
}

impl RunPolicy {
    pub fn from_plan(plan: &Plan) -> Self {
        Self {
            stop_on_error: plan.stop_on_error,
        }
    }
}

/// Runs every step of `plan` in order and aggregates the plan verdict.
///
/// Step errors are recorded, not returned. The instrument's ambient timeout
/// is left as it was found.
pub fn run_plan<I, S>(
    plan: &Plan,
    instrument: &mut I,
    sink: &mut S,
    policy: &RunPolicy,
) -> RunArtifacts
where
    I: Instrument + ?Sized,
    S: ResultSink + ?Sized,
{
    let mut verdict = PlanVerdict::NotSet;
    let mut records = Vec::with_capacity(plan.steps.len());
    let mut halted = false;

    tracing::info!(plan = %plan.name, steps = plan.steps.len(), "plan started");

    for step in &plan.steps {
        if halted {
            records.push(StepRecord {
                name: step.name.clone(),
                node: step.node.name,
                line: String::new(),
                status: StepStatus::Skipped,
                value: None,
                published: false,
                duration_ms: 0,
                message: Some("skipped after an earlier failure".into()),
            });
            continue;
        }

        let span = tracing::info_span!("step", name = %step.name, node = step.node.name);
        let _guard = span.enter();
        let started = Instant::now();
        let result = step.run(instrument, sink);
        let duration_ms = started.elapsed().as_millis() as u64;

        let record = match result {
            Ok(out) => {
                verdict.upgrade(PlanVerdict::from(out.outcome));
                let status = StepStatus::from_outcome(out.outcome);
                let message = match (&out.value, status) {
                    (Some(value), StepStatus::Fail) => Some(format!("got {}", value)),
                    _ => None,
                };
                tracing::info!(%status, line = %out.line, duration_ms, "step finished");
                StepRecord {
                    name: step.name.clone(),
                    node: step.node.name,
                    line: out.line,
                    status,
                    value: out.value,
                    published: out.published,
                    duration_ms,
                    message,
                }
            }
            Err(err) => {
                verdict.upgrade(PlanVerdict::Error);
                tracing::warn!(error = %err, duration_ms, "step failed");
                StepRecord {
                    name: step.name.clone(),
                    node: step.node.name,
                    line: step.line().unwrap_or_default(),
                    status: StepStatus::Error,
                    value: None,
                    published: false,
                    duration_ms,
                    message: Some(err.to_string()),
                }
            }
        };

        if policy.stop_on_error && matches!(record.status, StepStatus::Fail | StepStatus::Error) {
            halted = true;
        }
        records.push(record);
    }

    tracing::info!(plan = %plan.name, %verdict, "plan finished");

    RunArtifacts {
        plan: plan.name.clone(),
        verdict,
        records,
    }
}
