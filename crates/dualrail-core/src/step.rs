//! A configured step: one node, its parameters, call context and verdict rule.

use crate::catalog::{NodeDescriptor, ResponseKind};
use crate::errors::{ExecError, StepError};
use crate::executor::{self, CallContext, Mode, RawValue};
use crate::instrument::Instrument;
use crate::param::{Parameter, Token};
use crate::publish::{maybe_publish, ResultSink};
use crate::verdict::{Outcome, Rule};
use std::borrow::Cow;

#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    pub node: &'static NodeDescriptor,
    pub params: Vec<Parameter<Token>>,
    pub context: CallContext,
    /// Unset behaves like `Ignore`.
    pub rule: Option<Rule>,
    pub publish: bool,
    /// Key of the published record. Defaults to the step name.
    pub publish_name: Option<String>,
}

/// What one successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub line: String,
    pub value: Option<RawValue>,
    /// Always `NotSet` for commands.
    pub outcome: Outcome,
    pub published: bool,
}

impl Step {
    pub fn new(
        name: impl Into<String>,
        node: &'static NodeDescriptor,
        context: CallContext,
    ) -> Self {
        Self {
            name: name.into(),
            node,
            params: Vec::new(),
            context,
            rule: None,
            publish: false,
            publish_name: None,
        }
    }

    pub fn param(mut self, param: impl Into<Parameter<Token>>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn rule(mut self, rule: impl Into<Rule>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    pub fn publish_as(mut self, name: impl Into<String>) -> Self {
        self.publish = true;
        self.publish_name = Some(name.into());
        self
    }

    pub fn mode(&self) -> Mode {
        self.context.mode
    }

    pub fn resolved_params(&self) -> Vec<Cow<'_, str>> {
        self.params.iter().map(Parameter::resolve).collect()
    }

    /// The program message this step sends.
    pub fn line(&self) -> Result<String, ExecError> {
        executor::format_line(self.node, &self.context, &self.resolved_params())
    }

    /// Checks that the configured rule can judge the node's response type.
    /// Commands never judge, so any rule is accepted on them.
    pub fn check_rule(&self) -> Result<(), StepError> {
        let (Mode::Query, Some(rule), Some(response)) =
            (self.context.mode, self.rule, self.node.response())
        else {
            return Ok(());
        };
        let compatible = rule.is_ignore()
            || match rule {
                Rule::Numeric(_) => response.is_numeric(),
                Rule::Boolean(_) => response == ResponseKind::Bool,
            };
        if compatible {
            Ok(())
        } else {
            Err(StepError::RuleMismatch {
                step: self.name.clone(),
                kind: rule.kind_name(),
                response,
            })
        }
    }

    /// Executes the step once.
    ///
    /// Queries start from `NotSet` and make exactly one transition to
    /// `Pass` or `Fail`; the verdict goes to the sink before the optional
    /// publish. A failed call returns before any verdict exists.
    pub fn run<I, S>(&self, instrument: &mut I, sink: &mut S) -> Result<StepOutcome, StepError>
    where
        I: Instrument + ?Sized,
        S: ResultSink + ?Sized,
    {
        self.check_rule()?;
        let params = self.resolved_params();
        let exec_err = |source: ExecError| StepError::Exec {
            step: self.name.clone(),
            source,
        };
        let line = executor::format_line(self.node, &self.context, &params).map_err(exec_err)?;
        let value =
            executor::execute(instrument, self.node, &self.context, &params).map_err(exec_err)?;

        let Some(value) = value else {
            return Ok(StepOutcome {
                line,
                value: None,
                outcome: Outcome::NotSet,
                published: false,
            });
        };

        let rule = self.rule.unwrap_or_default();
        let outcome = rule.judge(&value).ok_or_else(|| StepError::RuleMismatch {
            step: self.name.clone(),
            kind: rule.kind_name(),
            response: self.node.response().unwrap_or(ResponseKind::Text),
        })?;
        sink.set_verdict(&self.name, outcome);

        let publish_name = self.publish_name.as_deref().unwrap_or(&self.name);
        let published = maybe_publish(sink, publish_name, &value, self.publish);

        Ok(StepOutcome {
            line,
            value: Some(value),
            outcome,
            published,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::lookup;
    use crate::publish::MemorySink;
    use crate::sim::LoopbackInstrument;
    use crate::verdict::{BooleanRule, NumericRule};

    fn node(name: &str) -> &'static NodeDescriptor {
        lookup(name).unwrap()
    }

    #[test]
    fn query_in_band_passes_and_publishes() {
        let mut inst = LoopbackInstrument::new().respond("+1.25000000E+01");
        let mut sink = MemorySink::new();
        let step = Step::new("read voltage", node("measure.voltage"), CallContext::query())
            .rule(NumericRule::InBetween {
                lower: 10.0,
                upper: 15.0,
            })
            .publish_as("Voltage");

        let out = step.run(&mut inst, &mut sink).unwrap();
        assert_eq!(out.outcome, Outcome::Pass);
        assert_eq!(out.value, Some(RawValue::Number(12.5)));
        assert!(out.published);
        assert_eq!(sink.verdict_of("read voltage"), Some(Outcome::Pass));
        assert_eq!(
            serde_json::Value::Object(sink.published[0].payload.clone()),
            serde_json::json!({"Voltage": 12.5})
        );
    }

    #[test]
    fn query_on_band_edge_fails_but_still_publishes() {
        let mut inst = LoopbackInstrument::new().respond("15.0");
        let mut sink = MemorySink::new();
        let step = Step::new("read voltage", node("measure.voltage"), CallContext::query())
            .rule(NumericRule::InBetween {
                lower: 10.0,
                upper: 15.0,
            })
            .publish_as("Voltage");

        let out = step.run(&mut inst, &mut sink).unwrap();
        assert_eq!(out.outcome, Outcome::Fail);
        assert_eq!(sink.published.len(), 1);
    }

    #[test]
    fn boolean_mismatch_fails() {
        let mut inst = LoopbackInstrument::new().respond("1");
        let mut sink = MemorySink::new();
        let step = Step::new("output off?", node("output.state"), CallContext::query())
            .rule(BooleanRule::EqualTo { expected: false });

        let out = step.run(&mut inst, &mut sink).unwrap();
        assert_eq!(out.outcome, Outcome::Fail);
        assert!(!out.published);
        assert!(sink.published.is_empty());
    }

    #[test]
    fn command_with_raw_override_sends_it_verbatim() {
        let mut inst = LoopbackInstrument::new();
        let mut sink = MemorySink::new();
        let step = Step::new("nudge", node("source.voltage"), CallContext::command())
            .param(Parameter::<Token>::raw("UP 0.5"));

        let out = step.run(&mut inst, &mut sink).unwrap();
        assert_eq!(out.outcome, Outcome::NotSet);
        assert_eq!(out.value, None);
        assert_eq!(inst.writes(), vec!["VOLT UP 0.5"]);
        assert!(inst.queries().is_empty());
        assert!(sink.verdicts.is_empty());
    }

    #[test]
    fn no_rule_behaves_like_ignore() {
        let mut inst = LoopbackInstrument::new().respond("\"DUALRAIL,SIM,0,1.0\"");
        let mut sink = MemorySink::new();
        let step = Step::new("idn", node("common.idn"), CallContext::query());
        let out = step.run(&mut inst, &mut sink).unwrap();
        assert_eq!(out.outcome, Outcome::Pass);
    }

    #[test]
    fn failed_call_sets_no_verdict() {
        let mut inst = LoopbackInstrument::new().fail_with("bus fault");
        let mut sink = MemorySink::new();
        let step = Step::new("read current", node("measure.current"), CallContext::query())
            .rule(NumericRule::Ignore)
            .publish_as("Current");

        let err = step.run(&mut inst, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            StepError::Exec {
                source: ExecError::Instrument(_),
                ..
            }
        ));
        assert!(sink.verdicts.is_empty());
        assert!(sink.published.is_empty());
    }

    #[test]
    fn numeric_rule_on_text_node_is_rejected_before_io() {
        let mut inst = LoopbackInstrument::new().respond("whatever");
        let mut sink = MemorySink::new();
        let step = Step::new("idn", node("common.idn"), CallContext::query())
            .rule(NumericRule::GreaterThan { lower: 1.0 });

        let err = step.run(&mut inst, &mut sink).unwrap_err();
        assert!(matches!(err, StepError::RuleMismatch { .. }));
        assert!(inst.transcript().is_empty());
    }
}
