//! Step parameters: a closed enumerated value or a raw operator override.

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Renders a value to the SCPI token the instrument expects.
pub trait ScpiToken {
    fn token(&self) -> Cow<'_, str>;
}

impl ScpiToken for str {
    fn token(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl ScpiToken for String {
    fn token(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl ScpiToken for f64 {
    fn token(&self) -> Cow<'_, str> {
        Cow::Owned(format_number(*self))
    }
}

impl ScpiToken for i64 {
    fn token(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }
}

impl ScpiToken for u32 {
    fn token(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }
}

impl ScpiToken for bool {
    fn token(&self) -> Cow<'_, str> {
        Cow::Borrowed(if *self { "ON" } else { "OFF" })
    }
}

/// One user-supplied input to a step.
///
/// `Raw` is sent verbatim and never validated; it exists so an operator can
/// reach instrument features the closed set does not cover.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Parameter<E> {
    #[serde(rename = "value")]
    Enum(E),
    #[serde(rename = "raw")]
    Raw(String),
}

impl<E> Parameter<E> {
    pub fn raw(text: impl Into<String>) -> Self {
        Self::Raw(text.into())
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    /// Maps the enumerated side, leaving raw overrides untouched.
    pub fn try_map<F, T, Err>(&self, f: F) -> Result<Parameter<T>, Err>
    where
        F: FnOnce(&E) -> Result<T, Err>,
    {
        match self {
            Self::Enum(value) => f(value).map(Parameter::Enum),
            Self::Raw(text) => Ok(Parameter::Raw(text.clone())),
        }
    }
}

impl<E: ScpiToken> Parameter<E> {
    pub fn resolve(&self) -> Cow<'_, str> {
        match self {
            Self::Enum(value) => value.token(),
            Self::Raw(text) => Cow::Borrowed(text.as_str()),
        }
    }
}

impl<E> From<E> for Parameter<E> {
    fn from(value: E) -> Self {
        Self::Enum(value)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParameterRepr<E> {
    Raw { raw: String },
    Enum { value: E },
    Bare(E),
}

// Plan files accept `{ raw: "UP 0.5" }`, `{ value: MAX }` or a bare `MAX`.
impl<'de, E: Deserialize<'de>> Deserialize<'de> for Parameter<E> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match ParameterRepr::deserialize(deserializer)? {
            ParameterRepr::Raw { raw } => Parameter::Raw(raw),
            ParameterRepr::Enum { value } | ParameterRepr::Bare(value) => Parameter::Enum(value),
        })
    }
}

/// Untyped scalar as written in a plan file, before it is checked against a
/// node's parameter kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A parameter value that passed validation against its node.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Member of the node's closed keyword set, in canonical spelling.
    Keyword(&'static str),
    Number(f64),
    Integer(i64),
    Switch(bool),
    /// Free text, sent as a quoted SCPI string.
    Text(String),
}

impl ScpiToken for Token {
    fn token(&self) -> Cow<'_, str> {
        match self {
            Token::Keyword(k) => Cow::Borrowed(k),
            Token::Number(n) => n.token(),
            Token::Integer(i) => i.token(),
            Token::Switch(b) => b.token(),
            Token::Text(s) => Cow::Owned(quote(s)),
        }
    }
}

/// Numeric setting keywords shared by level-style nodes (VOLT, CURR, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Min,
    Max,
    Def,
    Up,
    Down,
}

impl Level {
    pub const TOKENS: &'static [&'static str] = &["MIN", "MAX", "DEF", "UP", "DOWN"];
}

impl ScpiToken for Level {
    fn token(&self) -> Cow<'_, str> {
        Cow::Borrowed(match self {
            Level::Min => "MIN",
            Level::Max => "MAX",
            Level::Def => "DEF",
            Level::Up => "UP",
            Level::Down => "DOWN",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputSelect {
    #[serde(rename = "OUTP1")]
    Out1,
    #[serde(rename = "OUTP2")]
    Out2,
}

impl OutputSelect {
    pub const TOKENS: &'static [&'static str] = &["OUTP1", "OUTP2"];
}

impl ScpiToken for OutputSelect {
    fn token(&self) -> Cow<'_, str> {
        Cow::Borrowed(match self {
            OutputSelect::Out1 => "OUTP1",
            OutputSelect::Out2 => "OUTP2",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerSource {
    #[serde(rename = "BUS")]
    Bus,
    #[serde(rename = "IMM")]
    Immediate,
}

impl TriggerSource {
    pub const TOKENS: &'static [&'static str] = &["BUS", "IMM"];
}

impl ScpiToken for TriggerSource {
    fn token(&self) -> Cow<'_, str> {
        Cow::Borrowed(match self {
            TriggerSource::Bus => "BUS",
            TriggerSource::Immediate => "IMM",
        })
    }
}

/// Formats a number the way SCPI numeric program data is written.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NAN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "INF" } else { "NINF" }.to_string()
    } else {
        format!("{}", n)
    }
}

/// SCPI string program data: double quotes, embedded quotes doubled.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_override_wins_over_enum() {
        let p: Parameter<Level> = Parameter::raw("MIN");
        assert_eq!(p.resolve(), "MIN");

        let p: Parameter<Level> = Parameter::raw("UP 0.5");
        assert_eq!(p.resolve(), "UP 0.5");
    }

    #[test]
    fn enum_renders_canonical_token() {
        assert_eq!(Parameter::Enum(Level::Min).resolve(), "MIN");
        assert_eq!(Parameter::Enum(OutputSelect::Out2).resolve(), "OUTP2");
        assert_eq!(Parameter::Enum(TriggerSource::Immediate).resolve(), "IMM");
        assert_eq!(Parameter::Enum(12.5f64).resolve(), "12.5");
        assert_eq!(Parameter::Enum(true).resolve(), "ON");
    }

    #[test]
    fn raw_override_is_not_validated() {
        let p: Parameter<Token> = Parameter::raw("");
        assert_eq!(p.resolve(), "");
        let p: Parameter<Token> = Parameter::raw("not a keyword at all");
        assert_eq!(p.resolve(), "not a keyword at all");
    }

    #[test]
    fn text_tokens_are_quoted() {
        assert_eq!(Token::Text("HELLO".into()).token(), "\"HELLO\"");
        assert_eq!(Token::Text("say \"hi\"".into()).token(), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn numbers_use_scpi_spelling() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(0.001), "0.001");
        assert_eq!(format_number(f64::INFINITY), "INF");
        assert_eq!(format_number(f64::NEG_INFINITY), "NINF");
    }

    #[test]
    fn plan_syntax_forms() {
        let p: Parameter<Scalar> = serde_yaml::from_str("raw: UP 0.5").unwrap();
        assert_eq!(p, Parameter::Raw("UP 0.5".into()));

        let p: Parameter<Scalar> = serde_yaml::from_str("value: MAX").unwrap();
        assert_eq!(p, Parameter::Enum(Scalar::Text("MAX".into())));

        let p: Parameter<Scalar> = serde_yaml::from_str("12.5").unwrap();
        assert_eq!(p, Parameter::Enum(Scalar::Number(12.5)));

        let p: Parameter<Scalar> = serde_yaml::from_str("2").unwrap();
        assert_eq!(p, Parameter::Enum(Scalar::Integer(2)));

        let p: Parameter<Scalar> = serde_yaml::from_str("true").unwrap();
        assert_eq!(p, Parameter::Enum(Scalar::Bool(true)));
    }
}
