//! YAML test plans: an ordered list of steps against one supply.

use crate::catalog::{self, NodeDescriptor, Slot};
use crate::errors::{ConfigError, StepError};
use crate::executor::{CallContext, Mode};
use crate::param::{Parameter, Scalar, Token};
use crate::sim::DEFAULT_TIMEOUT_MS;
use crate::step::Step;
use crate::verdict::Rule;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

pub const SUPPORTED_PLAN_VERSION: u32 = 1;

#[derive(Debug, Clone, Deserialize)]
pub struct PlanConfig {
    pub version: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub instrument: InstrumentConfig,
    #[serde(default)]
    pub stop_on_error: bool,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    /// Ambient I/O timeout the instrument is opened with.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u32,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            io_timeout_ms: default_io_timeout_ms(),
        }
    }
}

fn default_io_timeout_ms() -> u32 {
    DEFAULT_TIMEOUT_MS
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    pub name: String,
    /// Catalog name, e.g. `source.voltage`.
    pub node: String,
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub params: Vec<Parameter<Scalar>>,
    #[serde(default)]
    pub suffix: Option<u32>,
    /// Overrides the ambient timeout for this step only.
    #[serde(default)]
    pub timeout_ms: Option<u32>,
    #[serde(default)]
    pub verdict: Option<Rule>,
    #[serde(default)]
    pub publish: PublishConfig,
}

/// `publish: true` publishes under the step name, `publish: Voltage` under
/// the given key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PublishConfig {
    Enabled(bool),
    Named(String),
}

impl Default for PublishConfig {
    fn default() -> Self {
        PublishConfig::Enabled(false)
    }
}

impl PublishConfig {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, PublishConfig::Enabled(false))
    }
}

/// A validated plan, ready to run.
#[derive(Debug, Clone)]
pub struct Plan {
    pub name: String,
    pub io_timeout_ms: u32,
    pub stop_on_error: bool,
    pub steps: Vec<Step>,
}

pub fn load_plan(path: &Path) -> Result<Plan, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let mut plan = parse_plan(&raw)?;
    if plan.name.is_empty() {
        plan.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "plan".to_string());
    }
    Ok(plan)
}

/// Parses and validates a plan. Every step is bound against the catalog
/// here, so a plan that loads can only fail at run time on the instrument.
pub fn parse_plan(raw: &str) -> Result<Plan, ConfigError> {
    let cfg: PlanConfig = serde_yaml::from_str(raw)?;
    if cfg.version != SUPPORTED_PLAN_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            found: cfg.version,
            supported: SUPPORTED_PLAN_VERSION,
        });
    }
    if cfg.steps.is_empty() {
        return Err(ConfigError::Empty);
    }
    if cfg.instrument.io_timeout_ms == 0 {
        return Err(ConfigError::invalid_step(
            "instrument",
            "io_timeout_ms must be positive",
        ));
    }

    let mut seen = HashSet::new();
    let mut steps = Vec::with_capacity(cfg.steps.len());
    for step_cfg in &cfg.steps {
        if !seen.insert(step_cfg.name.as_str()) {
            return Err(ConfigError::invalid_step(
                &step_cfg.name,
                "duplicate step name",
            ));
        }
        steps.push(build_step(step_cfg)?);
    }

    Ok(Plan {
        name: cfg.name.unwrap_or_default(),
        io_timeout_ms: cfg.instrument.io_timeout_ms,
        stop_on_error: cfg.stop_on_error,
        steps,
    })
}

pub fn build_step(cfg: &StepConfig) -> Result<Step, ConfigError> {
    let invalid = |message: String| ConfigError::invalid_step(&cfg.name, message);

    let node = catalog::lookup(&cfg.node)
        .ok_or_else(|| invalid(format!("unknown node '{}'", cfg.node)))?;
    let mode = cfg.mode.unwrap_or_else(|| infer_mode(node, cfg));

    let slots: &[Slot] = match mode {
        Mode::Command => node.command,
        Mode::Query => node.query.map(|q| q.params),
    }
    .ok_or_else(|| invalid(format!("{} does not support {:?} mode", node.name, mode)))?;

    let required = slots.iter().filter(|s| !s.optional).count();
    if cfg.params.len() < required || cfg.params.len() > slots.len() {
        return Err(invalid(format!(
            "{} takes {}..={} parameters, got {}",
            node.name,
            required,
            slots.len(),
            cfg.params.len()
        )));
    }
    let params = cfg
        .params
        .iter()
        .zip(slots)
        .map(|(param, slot)| {
            param
                .try_map(|scalar| slot.kind.bind(scalar))
                .map_err(|msg| invalid(format!("parameter '{}': {}", slot.name, msg)))
        })
        .collect::<Result<Vec<Parameter<Token>>, _>>()?;

    match (node.is_indexed(), cfg.suffix) {
        (true, None) => return Err(invalid(format!("{} needs a suffix", node.name))),
        (false, Some(_)) => return Err(invalid(format!("{} is not indexed", node.name))),
        _ => {}
    }
    if cfg.timeout_ms == Some(0) {
        return Err(invalid("timeout_ms must be positive".into()));
    }
    if mode == Mode::Command && (cfg.verdict.is_some() || cfg.publish.is_enabled()) {
        return Err(invalid(
            "verdict and publish only apply to query steps".into(),
        ));
    }

    let mut context = match mode {
        Mode::Command => CallContext::command(),
        Mode::Query => CallContext::query(),
    };
    context.timeout_override_ms = cfg.timeout_ms;
    context.suffix = cfg.suffix;

    let mut step = Step::new(&cfg.name, node, context);
    step.params = params;
    step.rule = cfg.verdict;
    match &cfg.publish {
        PublishConfig::Enabled(enabled) => step.publish = *enabled,
        PublishConfig::Named(name) => step = step.publish_as(name),
    }

    step.check_rule().map_err(|err| match err {
        StepError::RuleMismatch { kind, response, .. } => invalid(format!(
            "{} rule cannot judge a {:?} response",
            kind, response
        )),
        other => invalid(other.to_string()),
    })?;
    Ok(step)
}

/// Nodes that support a single mode use it. Otherwise a step that judges or
/// publishes is a query and anything else is a command.
fn infer_mode(node: &NodeDescriptor, cfg: &StepConfig) -> Mode {
    match (node.supports_command(), node.supports_query()) {
        (true, false) => Mode::Command,
        (false, true) => Mode::Query,
        _ if cfg.verdict.is_some() || cfg.publish.is_enabled() => Mode::Query,
        _ => Mode::Command,
    }
}
