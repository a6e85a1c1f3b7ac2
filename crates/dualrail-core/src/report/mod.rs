pub mod console;
pub mod json;
pub mod junit;

use crate::runner::{StepRecord, StepStatus};
use crate::verdict::PlanVerdict;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RunArtifacts {
    pub plan: String,
    pub verdict: PlanVerdict,
    pub records: Vec<StepRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub pass: usize,
    pub fail: usize,
    pub done: usize,
    pub error: usize,
    pub skipped: usize,
}

impl RunArtifacts {
    pub fn summary(&self) -> Summary {
        let mut s = Summary::default();
        for r in &self.records {
            match r.status {
                StepStatus::Pass => s.pass += 1,
                StepStatus::Fail => s.fail += 1,
                StepStatus::Done => s.done += 1,
                StepStatus::Error => s.error += 1,
                StepStatus::Skipped => s.skipped += 1,
            }
        }
        s
    }
}
