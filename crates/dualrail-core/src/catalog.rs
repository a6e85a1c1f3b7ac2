//! Static descriptor table for the supply family's SCPI tree.
//!
//! Each entry carries everything a generic step needs: the header, which
//! modes the node supports, the parameter slots and the response type.
//! Headers use the short mnemonic form; indexed nodes carry a `<n>`
//! placeholder that the call context's suffix fills in.

use crate::param::{Level, OutputSelect, Scalar, Token, TriggerSource};
use std::borrow::Cow;
use std::fmt;

pub const SUFFIX_PLACEHOLDER: &str = "<n>";

/// How a parameter slot is validated and rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    /// `<numeric>|MIN|MAX|DEF|UP|DOWN`
    Level,
    /// `ON|OFF`
    Switch,
    /// A closed keyword set.
    Choice(&'static [&'static str]),
    Integer,
    Number,
    /// Quoted string data.
    Text,
}

impl ParamKind {
    /// Checks a plan-file scalar against this kind and converts it to the
    /// token that will be sent.
    pub fn bind(&self, value: &Scalar) -> Result<Token, String> {
        match (self, value) {
            (ParamKind::Level, Scalar::Number(n)) | (ParamKind::Number, Scalar::Number(n)) => {
                Ok(Token::Number(*n))
            }
            (ParamKind::Level, Scalar::Integer(i)) | (ParamKind::Number, Scalar::Integer(i)) => {
                Ok(Token::Number(*i as f64))
            }
            (ParamKind::Level, Scalar::Text(s)) => match_keyword(Level::TOKENS, s),
            (ParamKind::Switch, Scalar::Bool(b)) => Ok(Token::Switch(*b)),
            (ParamKind::Switch, Scalar::Integer(i)) if *i == 0 || *i == 1 => {
                Ok(Token::Switch(*i == 1))
            }
            (ParamKind::Switch, Scalar::Text(s)) => match s.to_ascii_uppercase().as_str() {
                "ON" | "1" => Ok(Token::Switch(true)),
                "OFF" | "0" => Ok(Token::Switch(false)),
                _ => Err(format!("expected ON or OFF, got '{}'", s)),
            },
            (ParamKind::Choice(options), Scalar::Text(s)) => match_keyword(options, s),
            (ParamKind::Integer, Scalar::Integer(i)) => Ok(Token::Integer(*i)),
            (ParamKind::Text, Scalar::Text(s)) => Ok(Token::Text(s.clone())),
            (kind, value) => Err(format!("'{}' is not a valid {}", value, kind)),
        }
    }
}

/// Matches either the canonical token or its long SCPI form
/// (`MINimum`, `DEFault`), case-insensitively.
fn match_keyword(options: &'static [&'static str], given: &str) -> Result<Token, String> {
    let upper = given.trim().to_ascii_uppercase();
    options
        .iter()
        .find(|opt| upper == **opt || is_long_form(&upper, opt))
        .map(|opt| Token::Keyword(*opt))
        .ok_or_else(|| format!("'{}' is not one of {}", given, options.join("|")))
}

fn is_long_form(given: &str, short: &str) -> bool {
    given.len() > short.len()
        && given.starts_with(short)
        && given[short.len()..].chars().all(|c| c.is_ascii_alphabetic())
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Level => write!(f, "<numeric>|{}", Level::TOKENS.join("|")),
            ParamKind::Switch => f.write_str("ON|OFF"),
            ParamKind::Choice(options) => f.write_str(&options.join("|")),
            ParamKind::Integer => f.write_str("<integer>"),
            ParamKind::Number => f.write_str("<numeric>"),
            ParamKind::Text => f.write_str("<string>"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Number,
    Integer,
    Bool,
    Text,
}

impl ResponseKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ResponseKind::Number | ResponseKind::Integer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub name: &'static str,
    pub kind: ParamKind,
    pub optional: bool,
}

impl Slot {
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            optional: false,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            optional: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuerySpec {
    pub params: &'static [Slot],
    pub response: ResponseKind,
}

/// One leaf of the SCPI tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeDescriptor {
    pub name: &'static str,
    pub header: &'static str,
    /// `None` when the node cannot be written.
    pub command: Option<&'static [Slot]>,
    /// `None` when the node cannot be queried.
    pub query: Option<QuerySpec>,
}

impl NodeDescriptor {
    const fn new(name: &'static str, header: &'static str) -> Self {
        Self {
            name,
            header,
            command: None,
            query: None,
        }
    }

    const fn cmd(self, params: &'static [Slot]) -> Self {
        Self {
            command: Some(params),
            ..self
        }
    }

    const fn get(self, params: &'static [Slot], response: ResponseKind) -> Self {
        Self {
            query: Some(QuerySpec { params, response }),
            ..self
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.header.contains(SUFFIX_PLACEHOLDER)
    }

    pub fn supports_command(&self) -> bool {
        self.command.is_some()
    }

    pub fn supports_query(&self) -> bool {
        self.query.is_some()
    }

    pub fn response(&self) -> Option<ResponseKind> {
        self.query.map(|q| q.response)
    }

    /// Header with the index suffix substituted. Returns `None` when an
    /// indexed node is rendered without a suffix.
    pub fn render_header(&self, suffix: Option<u32>) -> Option<Cow<'static, str>> {
        match (self.is_indexed(), suffix) {
            (true, Some(n)) => Some(Cow::Owned(
                self.header.replace(SUFFIX_PLACEHOLDER, &n.to_string()),
            )),
            (true, None) => None,
            (false, _) => Some(Cow::Borrowed(self.header)),
        }
    }
}

const NONE: &[Slot] = &[];
const INT: &[Slot] = &[Slot::required("value", ParamKind::Integer)];
const LEVEL: &[Slot] = &[Slot::required("level", ParamKind::Level)];
const SWITCH: &[Slot] = &[Slot::required("state", ParamKind::Switch)];
const LIMIT_QUERY: &[Slot] = &[Slot::optional("limit", ParamKind::Choice(&["MIN", "MAX"]))];
const APPLY: &[Slot] = &[
    Slot::required("voltage", ParamKind::Level),
    Slot::optional("current", ParamKind::Level),
];
const OUTPUT_SELECT: &[Slot] = &[Slot::required(
    "output",
    ParamKind::Choice(OutputSelect::TOKENS),
)];
const VOLTAGE_RANGE: &[Slot] = &[Slot::required(
    "range",
    ParamKind::Choice(&["P8V", "P20V", "P35V", "P60V", "LOW", "HIGH"]),
)];
const TRIGGER_SOURCE: &[Slot] = &[Slot::required(
    "source",
    ParamKind::Choice(TriggerSource::TOKENS),
)];
const TEXT: &[Slot] = &[Slot::required("text", ParamKind::Text)];
const STATE_NAME: &[Slot] = &[
    Slot::required("location", ParamKind::Integer),
    Slot::optional("name", ParamKind::Text),
];

use ResponseKind::{Bool, Integer, Number, Text};

pub static CATALOG: &[NodeDescriptor] = &[
    // IEEE 488.2 common commands
    NodeDescriptor::new("common.cls", "*CLS").cmd(NONE),
    NodeDescriptor::new("common.ese", "*ESE").cmd(INT).get(NONE, Integer),
    NodeDescriptor::new("common.esr", "*ESR").get(NONE, Integer),
    NodeDescriptor::new("common.idn", "*IDN").get(NONE, Text),
    NodeDescriptor::new("common.opc", "*OPC").cmd(NONE).get(NONE, Integer),
    NodeDescriptor::new("common.psc", "*PSC").cmd(INT).get(NONE, Integer),
    NodeDescriptor::new("common.rcl", "*RCL").cmd(INT),
    NodeDescriptor::new("common.rst", "*RST").cmd(NONE),
    NodeDescriptor::new("common.sav", "*SAV").cmd(INT),
    NodeDescriptor::new("common.sre", "*SRE").cmd(INT).get(NONE, Integer),
    NodeDescriptor::new("common.stb", "*STB").get(NONE, Integer),
    NodeDescriptor::new("common.trg", "*TRG").cmd(NONE),
    NodeDescriptor::new("common.tst", "*TST").get(NONE, Integer),
    NodeDescriptor::new("common.wai", "*WAI").cmd(NONE),
    // APPLy / INSTrument
    NodeDescriptor::new("apply", "APPL").cmd(APPLY).get(NONE, Text),
    NodeDescriptor::new("instrument.select", "INST:SEL")
        .cmd(OUTPUT_SELECT)
        .get(NONE, Text),
    NodeDescriptor::new("instrument.nselect", "INST:NSEL")
        .cmd(INT)
        .get(NONE, Integer),
    NodeDescriptor::new("instrument.couple", "INST:COUP")
        .cmd(SWITCH)
        .get(NONE, Bool),
    // MEASure
    NodeDescriptor::new("measure.current", "MEAS:CURR").get(NONE, Number),
    NodeDescriptor::new("measure.voltage", "MEAS:VOLT").get(NONE, Number),
    // OUTPut
    NodeDescriptor::new("output.state", "OUTP").cmd(SWITCH).get(NONE, Bool),
    NodeDescriptor::new("output.relay", "OUTP:REL")
        .cmd(SWITCH)
        .get(NONE, Bool),
    // SOURce
    NodeDescriptor::new("source.current", "CURR")
        .cmd(LEVEL)
        .get(LIMIT_QUERY, Number),
    NodeDescriptor::new("source.current.step", "CURR:STEP")
        .cmd(LEVEL)
        .get(NONE, Number),
    NodeDescriptor::new("source.current.triggered", "CURR:TRIG")
        .cmd(LEVEL)
        .get(LIMIT_QUERY, Number),
    NodeDescriptor::new("source.voltage", "VOLT")
        .cmd(LEVEL)
        .get(LIMIT_QUERY, Number),
    NodeDescriptor::new("source.voltage.step", "VOLT:STEP")
        .cmd(LEVEL)
        .get(NONE, Number),
    NodeDescriptor::new("source.voltage.triggered", "VOLT:TRIG")
        .cmd(LEVEL)
        .get(LIMIT_QUERY, Number),
    NodeDescriptor::new("source.voltage.protection", "VOLT:PROT")
        .cmd(LEVEL)
        .get(LIMIT_QUERY, Number),
    NodeDescriptor::new("source.voltage.protection.state", "VOLT:PROT:STAT")
        .cmd(SWITCH)
        .get(NONE, Bool),
    NodeDescriptor::new("source.voltage.protection.tripped", "VOLT:PROT:TRIP").get(NONE, Bool),
    NodeDescriptor::new("source.voltage.protection.clear", "VOLT:PROT:CLE").cmd(NONE),
    NodeDescriptor::new("source.voltage.range", "VOLT:RANG")
        .cmd(VOLTAGE_RANGE)
        .get(NONE, Text),
    // TRIGger / INITiate
    NodeDescriptor::new("trigger.delay", "TRIG:DEL")
        .cmd(LEVEL)
        .get(LIMIT_QUERY, Number),
    NodeDescriptor::new("trigger.source", "TRIG:SOUR")
        .cmd(TRIGGER_SOURCE)
        .get(NONE, Text),
    NodeDescriptor::new("initiate", "INIT").cmd(NONE),
    // DISPlay
    NodeDescriptor::new("display.state", "DISP").cmd(SWITCH).get(NONE, Bool),
    NodeDescriptor::new("display.text", "DISP:TEXT").cmd(TEXT).get(NONE, Text),
    NodeDescriptor::new("display.text.clear", "DISP:TEXT:CLE").cmd(NONE),
    // MEMory
    NodeDescriptor::new("memory.state.name", "MEM:STAT:NAME")
        .cmd(STATE_NAME)
        .get(INT, Text),
    // SYSTem
    NodeDescriptor::new("system.beeper", "SYST:BEEP").cmd(NONE),
    NodeDescriptor::new("system.error", "SYST:ERR").get(NONE, Text),
    NodeDescriptor::new("system.version", "SYST:VERS").get(NONE, Text),
    NodeDescriptor::new("system.local", "SYST:LOC").cmd(NONE),
    NodeDescriptor::new("system.remote", "SYST:REM").cmd(NONE),
    NodeDescriptor::new("system.rwlock", "SYST:RWL").cmd(NONE),
    // STATus
    NodeDescriptor::new("status.questionable.event", "STAT:QUES:EVEN").get(NONE, Integer),
    NodeDescriptor::new("status.questionable.condition", "STAT:QUES:COND").get(NONE, Integer),
    NodeDescriptor::new("status.questionable.enable", "STAT:QUES:ENAB")
        .cmd(INT)
        .get(NONE, Integer),
    NodeDescriptor::new("status.questionable.instrument.event", "STAT:QUES:INST:EVEN")
        .get(NONE, Integer),
    NodeDescriptor::new("status.questionable.instrument.enable", "STAT:QUES:INST:ENAB")
        .cmd(INT)
        .get(NONE, Integer),
    NodeDescriptor::new(
        "status.questionable.instrument.isummary.event",
        "STAT:QUES:INST:ISUM<n>:EVEN",
    )
    .get(NONE, Integer),
    NodeDescriptor::new(
        "status.questionable.instrument.isummary.condition",
        "STAT:QUES:INST:ISUM<n>:COND",
    )
    .get(NONE, Integer),
    NodeDescriptor::new(
        "status.questionable.instrument.isummary.enable",
        "STAT:QUES:INST:ISUM<n>:ENAB",
    )
    .cmd(INT)
    .get(NONE, Integer),
];

pub fn lookup(name: &str) -> Option<&'static NodeDescriptor> {
    CATALOG.iter().find(|node| node.name == name)
}

pub fn iter() -> impl Iterator<Item = &'static NodeDescriptor> {
    CATALOG.iter()
}
