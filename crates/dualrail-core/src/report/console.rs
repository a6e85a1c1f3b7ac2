use crate::report::RunArtifacts;
use crate::runner::StepStatus;

pub fn print_summary(artifacts: &RunArtifacts) {
    for r in &artifacts.records {
        match (&r.status, &r.message) {
            (StepStatus::Fail | StepStatus::Error, Some(msg)) => {
                eprintln!("  [{}] {}: {}", r.status, r.name, msg)
            }
            _ => eprintln!("  [{}] {}", r.status, r.name),
        }
    }

    let s = artifacts.summary();
    eprintln!(
        "Results: pass={} fail={} done={} error={} skipped={}",
        s.pass, s.fail, s.done, s.error, s.skipped
    );
    eprintln!("Verdict: {}", artifacts.verdict);
}
