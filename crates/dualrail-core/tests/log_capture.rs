//! Executor and runner log events, captured as JSON lines.

use dualrail_core::plan::parse_plan;
use dualrail_core::publish::TracingSink;
use dualrail_core::runner::{run_plan, RunPolicy};
use dualrail_core::sim::LoopbackInstrument;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone)]
struct MockWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl std::io::Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for MockWriter {
    type Writer = MockWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn setup_capture() -> (MockWriter, tracing::subscriber::DefaultGuard) {
    let writer = MockWriter {
        buf: Arc::new(Mutex::new(Vec::new())),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .json()
        .finish();
    (writer, tracing::subscriber::set_default(subscriber))
}

fn events(writer: &MockWriter) -> Vec<serde_json::Value> {
    let raw = String::from_utf8(writer.buf.lock().unwrap().clone()).unwrap();
    raw.lines()
        .filter_map(|l| serde_json::from_str(l.trim()).ok())
        .collect()
}

fn messages(events: &[serde_json::Value]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| e["fields"]["message"].as_str().map(String::from))
        .collect()
}

#[test]
fn logs_override_query_and_restore() {
    let (writer, _guard) = setup_capture();
    let plan = parse_plan(
        "version: 1\nsteps:\n  - { name: v, node: measure.voltage, timeout_ms: 40, verdict: { kind: less_than, upper: 9 }, publish: Volts }\n",
    )
    .unwrap();
    let mut inst = LoopbackInstrument::new().respond("+3.3");

    run_plan(&plan, &mut inst, &mut TracingSink, &RunPolicy::default());

    let events = events(&writer);
    let msgs = messages(&events);
    for expected in [
        "plan started",
        "applying i/o timeout override",
        "scpi query",
        "scpi response",
        "restoring i/o timeout",
        "step finished",
        "plan finished",
    ] {
        assert!(msgs.iter().any(|m| m == expected), "missing '{expected}' in {msgs:?}");
    }

    let publish = events
        .iter()
        .find(|e| e["fields"]["event"] == "publish")
        .expect("publish event");
    assert_eq!(publish["fields"]["name"], "Volts");
    assert!(publish["fields"]["payload"]
        .as_str()
        .unwrap()
        .contains("\"Volts\":3.3"));
}

#[test]
fn failed_step_logs_a_warning() {
    let (writer, _guard) = setup_capture();
    let plan =
        parse_plan("version: 1\nsteps:\n  - { name: v, node: measure.current }\n").unwrap();
    let mut inst = LoopbackInstrument::new().fail_with("cable unplugged");

    run_plan(&plan, &mut inst, &mut TracingSink, &RunPolicy::default());

    let events = events(&writer);
    let warn = events
        .iter()
        .find(|e| e["level"] == "WARN")
        .expect("warning event");
    assert_eq!(warn["fields"]["message"], "step failed");
    assert!(warn["fields"]["error"]
        .as_str()
        .unwrap()
        .contains("cable unplugged"));
}
