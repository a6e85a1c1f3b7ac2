//! Limit tests applied to query results.
//!
//! `InBetween` is exclusive on both sides while `GreaterThan` and
//! `LessThan` include their bound. Existing plans rely on this asymmetry.

use crate::executor::RawValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of judging one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Outcome {
    #[default]
    NotSet,
    Pass,
    Fail,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::NotSet => "not set",
            Outcome::Pass => "pass",
            Outcome::Fail => "fail",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NumericRule {
    EqualTo { value: f64 },
    LessThan { upper: f64 },
    GreaterThan { lower: f64 },
    InBetween { lower: f64, upper: f64 },
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BooleanRule {
    EqualTo { expected: bool },
    Ignore,
}

pub fn evaluate_numeric(value: f64, rule: &NumericRule) -> Outcome {
    let passed = match *rule {
        NumericRule::InBetween { lower, upper } => lower < value && value < upper,
        NumericRule::EqualTo { value: expected } => value == expected,
        NumericRule::GreaterThan { lower } => value >= lower,
        NumericRule::LessThan { upper } => value <= upper,
        NumericRule::Ignore => true,
    };
    if passed {
        Outcome::Pass
    } else {
        Outcome::Fail
    }
}

pub fn evaluate_boolean(value: bool, rule: &BooleanRule) -> Outcome {
    let passed = match *rule {
        BooleanRule::EqualTo { expected } => value == expected,
        BooleanRule::Ignore => true,
    };
    if passed {
        Outcome::Pass
    } else {
        Outcome::Fail
    }
}

/// A rule as configured on a step.
///
/// In plan files the flavour is inferred from the fields: `expected` makes a
/// boolean rule, `value`/`lower`/`upper` a numeric one. Fields the chosen
/// kind does not read are accepted and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rule {
    Numeric(NumericRule),
    Boolean(BooleanRule),
}

impl Rule {
    pub fn is_ignore(&self) -> bool {
        matches!(
            self,
            Rule::Numeric(NumericRule::Ignore) | Rule::Boolean(BooleanRule::Ignore)
        )
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Rule::Numeric(_) if self.is_ignore() => "ignore",
            Rule::Boolean(_) if self.is_ignore() => "ignore",
            Rule::Numeric(_) => "numeric",
            Rule::Boolean(_) => "boolean",
        }
    }

    /// Judges a decoded value. `None` when the rule cannot read this kind of
    /// value (a numeric rule against text, for instance). `Ignore` accepts
    /// anything without looking at it.
    pub fn judge(&self, value: &RawValue) -> Option<Outcome> {
        if self.is_ignore() {
            return Some(Outcome::Pass);
        }
        match self {
            Rule::Numeric(rule) => value.as_f64().map(|v| evaluate_numeric(v, rule)),
            Rule::Boolean(rule) => value.as_bool().map(|v| evaluate_boolean(v, rule)),
        }
    }
}

impl Default for Rule {
    fn default() -> Self {
        Rule::Numeric(NumericRule::Ignore)
    }
}

impl From<NumericRule> for Rule {
    fn from(rule: NumericRule) -> Self {
        Rule::Numeric(rule)
    }
}

impl From<BooleanRule> for Rule {
    fn from(rule: BooleanRule) -> Self {
        Rule::Boolean(rule)
    }
}

/// Aggregate verdict across a plan. Ordered by severity; combining two
/// verdicts keeps the more severe one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanVerdict {
    #[default]
    NotSet,
    Pass,
    Fail,
    Error,
}

impl PlanVerdict {
    pub fn upgrade(&mut self, other: PlanVerdict) {
        if other > *self {
            *self = other;
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, PlanVerdict::NotSet | PlanVerdict::Pass)
    }
}

impl From<Outcome> for PlanVerdict {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::NotSet => PlanVerdict::NotSet,
            Outcome::Pass => PlanVerdict::Pass,
            Outcome::Fail => PlanVerdict::Fail,
        }
    }
}

impl fmt::Display for PlanVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlanVerdict::NotSet => "not set",
            PlanVerdict::Pass => "pass",
            PlanVerdict::Fail => "fail",
            PlanVerdict::Error => "error",
        })
    }
}
