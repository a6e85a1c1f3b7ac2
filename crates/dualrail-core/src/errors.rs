//! Error types for step execution and plan loading.

use crate::catalog::ResponseKind;
use crate::executor::Mode;
use crate::instrument::InstrumentError;

/// Failures of a single command/query execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The driver failed. Carried unchanged.
    #[error(transparent)]
    Instrument(#[from] InstrumentError),

    /// The reply could not be decoded as the node's declared type.
    #[error("malformed response to '{line}': expected {expected:?}, got '{raw}'")]
    MalformedResponse {
        line: String,
        expected: ResponseKind,
        raw: String,
    },

    #[error("{node} does not support {mode:?}")]
    UnsupportedMode { node: &'static str, mode: Mode },

    #[error("{node} is indexed and needs a suffix")]
    MissingSuffix { node: &'static str },

    #[error("{node} takes {min}..={max} parameters in {mode:?} mode, got {got}")]
    ParameterCount {
        node: &'static str,
        mode: Mode,
        min: usize,
        max: usize,
        got: usize,
    },
}

impl ExecError {
    /// True for failures reported by the driver itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Instrument(_))
    }
}

/// Failures of a step run. A failed step never produces a verdict.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("step '{step}': {source}")]
    Exec {
        step: String,
        #[source]
        source: ExecError,
    },

    #[error("step '{step}': {kind} rule cannot judge a {response:?} response")]
    RuleMismatch {
        step: String,
        kind: &'static str,
        response: ResponseKind,
    },
}

/// Plan file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read plan {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unsupported plan version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("plan has no steps")]
    Empty,

    #[error("step '{step}': {message}")]
    InvalidStep { step: String, message: String },
}

impl ConfigError {
    pub fn invalid_step(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidStep {
            step: step.into(),
            message: message.into(),
        }
    }
}

pub type ExecResult<T> = Result<T, ExecError>;
