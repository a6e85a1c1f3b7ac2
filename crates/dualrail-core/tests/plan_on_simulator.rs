use dualrail_core::executor::RawValue;
use dualrail_core::instrument::Instrument;
use dualrail_core::plan::parse_plan;
use dualrail_core::publish::MemorySink;
use dualrail_core::report::{json, junit};
use dualrail_core::runner::{run_plan, RunPolicy, StepStatus};
use dualrail_core::sim::SimulatedSupply;
use dualrail_core::verdict::PlanVerdict;
use dualrail_core::Outcome;

const BRING_UP: &str = r#"
version: 1
name: rail bring-up
instrument:
  io_timeout_ms: 1000
steps:
  - { name: reset, node: common.rst }
  - { name: clear, node: common.cls }
  - { name: identify, node: common.idn, publish: Identity }
  - { name: select 2, node: instrument.select, params: [OUTP2] }
  - { name: set voltage, node: source.voltage, params: [6] }
  - { name: set current, node: source.current, params: [1.0] }
  - { name: enable, node: output.state, params: [ON] }
  - name: output voltage
    node: measure.voltage
    timeout_ms: 250
    verdict: { kind: in_between, lower: 1.9, upper: 2.1 }
    publish: Voltage
  - name: output current
    node: measure.current
    verdict: { kind: greater_than, lower: 1.0 }
    publish: Current
  - name: in constant current
    node: status.questionable.instrument.isummary.condition
    suffix: 2
    verdict: { kind: equal_to, value: 1 }
  - name: output on
    node: output.state
    verdict: { kind: equal_to, expected: true }
  - name: no errors
    node: system.error
    publish: true
"#;

#[test]
fn bring_up_passes_on_loaded_output() {
    let plan = parse_plan(BRING_UP).unwrap();
    let mut sim = SimulatedSupply::new()
        .with_timeout_ms(plan.io_timeout_ms)
        .with_load(2, 2.0);
    let mut sink = MemorySink::new();

    let run = run_plan(&plan, &mut sim, &mut sink, &RunPolicy::from_plan(&plan));

    for r in &run.records {
        assert_ne!(r.status, StepStatus::Error, "{}: {:?}", r.name, r.message);
    }
    assert_eq!(run.verdict, PlanVerdict::Pass);
    assert_eq!(run.records[7].value, Some(RawValue::Number(2.0)));
    assert_eq!(sink.verdict_of("output current"), Some(Outcome::Pass));
    assert_eq!(sim.io_timeout_ms(), 1000);

    let names: Vec<&str> = sink.published.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Identity", "Voltage", "Current", "no errors"]);
    assert_eq!(
        sink.published[1].payload["Voltage"],
        serde_json::json!(2.0)
    );
    assert_eq!(
        sink.published[3].payload["no errors"],
        serde_json::json!("+0,\"No error\"")
    );
}

#[test]
fn open_circuit_fails_current_check_and_reports() {
    let plan = parse_plan(BRING_UP).unwrap();
    let mut sim = SimulatedSupply::new();
    let mut sink = MemorySink::new();

    let run = run_plan(&plan, &mut sim, &mut sink, &RunPolicy::default());
    assert_eq!(run.verdict, PlanVerdict::Fail);
    assert_eq!(run.summary().fail, 3);

    let report = json::to_json(&run);
    assert_eq!(report["verdict"], "fail");
    assert_eq!(report["steps"][7]["status"], "fail");
    assert_eq!(report["steps"][0]["status"], "done");

    let xml = junit::render_junit(&run);
    assert!(xml.contains(r#"<testsuite name="rail bring-up" tests="12" failures="3""#));
}

#[test]
fn rejected_setting_surfaces_through_error_queue() {
    let plan = parse_plan(
        r#"
version: 1
steps:
  - { name: too high, node: source.voltage, params: [{ raw: "99" }] }
  - name: queue
    node: system.error
    publish: true
"#,
    )
    .unwrap();
    let mut sim = SimulatedSupply::new();
    let mut sink = MemorySink::new();

    let run = run_plan(&plan, &mut sim, &mut sink, &RunPolicy::default());
    assert_eq!(run.records[0].status, StepStatus::Done);
    assert_eq!(
        run.records[1].value,
        Some(RawValue::Text("-222,\"Data out of range\"".into()))
    );
}
