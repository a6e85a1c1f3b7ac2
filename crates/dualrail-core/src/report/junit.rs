use crate::report::RunArtifacts;
use crate::runner::StepStatus;
use std::path::Path;

pub fn render_junit(artifacts: &RunArtifacts) -> String {
    let s = artifacts.summary();
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(
        r#"<testsuite name="{}" tests="{}" failures="{}" errors="{}" skipped="{}">"#,
        escape(&artifacts.plan),
        artifacts.records.len(),
        s.fail,
        s.error,
        s.skipped
    ));
    xml.push('\n');

    for r in &artifacts.records {
        xml.push_str(&format!(
            r#"  <testcase name="{}" classname="{}" time="{:.3}">"#,
            escape(&r.name),
            escape(r.node),
            r.duration_ms as f64 / 1000.0
        ));
        let message = r.message.as_deref().unwrap_or_default();
        match r.status {
            StepStatus::Pass | StepStatus::Done => {}
            StepStatus::Skipped => {
                xml.push_str(&format!(r#"<skipped message="{}"/>"#, escape(message)))
            }
            StepStatus::Fail => {
                xml.push_str(&format!(r#"<failure message="{}"/>"#, escape(message)))
            }
            StepStatus::Error => {
                xml.push_str(&format!(r#"<error message="{}"/>"#, escape(message)))
            }
        }
        xml.push_str("</testcase>\n");
    }

    xml.push_str("</testsuite>\n");
    xml
}

pub fn write_junit(artifacts: &RunArtifacts, out: &Path) -> anyhow::Result<()> {
    std::fs::write(out, render_junit(artifacts))?;
    Ok(())
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::StepRecord;
    use crate::verdict::PlanVerdict;

    fn record(name: &str, status: StepStatus, message: Option<&str>) -> StepRecord {
        StepRecord {
            name: name.into(),
            node: "measure.voltage",
            line: "MEAS:VOLT?".into(),
            status,
            value: None,
            published: false,
            duration_ms: 12,
            message: message.map(Into::into),
        }
    }

    #[test]
    fn renders_failures_and_escapes() {
        let artifacts = RunArtifacts {
            plan: "rails <A&B>".into(),
            verdict: PlanVerdict::Error,
            records: vec![
                record("ok", StepStatus::Pass, None),
                record("low", StepStatus::Fail, Some("got 4.2")),
                record("io", StepStatus::Error, Some("timed out \"2000\" ms")),
                record("rest", StepStatus::Skipped, Some("skipped")),
            ],
        };
        let xml = render_junit(&artifacts);
        assert!(xml.contains(r#"<testsuite name="rails &lt;A&amp;B&gt;" tests="4" failures="1" errors="1" skipped="1">"#));
        assert!(xml.contains(r#"<failure message="got 4.2"/>"#));
        assert!(xml.contains(r#"<error message="timed out &quot;2000&quot; ms"/>"#));
        assert!(xml.contains(r#"time="0.012""#));
    }
}
