//! In-memory two-output supply for dry runs.
//!
//! Understands the headers in the step catalog (short or long mnemonic
//! forms) well enough to exercise a plan end to end. Outputs can be given a
//! resistive load so that measurements and CV/CC status bits move.

use super::loopback::DEFAULT_TIMEOUT_MS;
use crate::instrument::{Instrument, InstrumentError, InstrumentResult};
use std::collections::VecDeque;

const IDN: &str = "DUALRAIL,SIM-2OUT,0,1.0-1.0";
const SCPI_VERSION: &str = "1994.0";
const MEMORY_SLOTS: usize = 5;
const ERROR_QUEUE_DEPTH: usize = 20;

const ISUM_CC: u16 = 1 << 0;
const ISUM_CV: u16 = 1 << 1;
const ISUM_OV: u16 = 1 << 9;
const QUES_ISUM: u16 = 1 << 13;

const ESR_OPC: u8 = 1 << 0;
const ESR_EXE: u8 = 1 << 4;
const ESR_CME: u8 = 1 << 5;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Limits {
    volt_max: f64,
    curr_max: f64,
    curr_def: f64,
}

const LOW_RANGE: Limits = Limits {
    volt_max: 8.24,
    curr_max: 3.09,
    curr_def: 3.0,
};

const HIGH_RANGE: Limits = Limits {
    volt_max: 20.6,
    curr_max: 1.545,
    curr_def: 1.5,
};

const OVP_MAX: f64 = 22.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Channel {
    high_range: bool,
    voltage: f64,
    current: f64,
    volt_step: f64,
    curr_step: f64,
    volt_trig: f64,
    curr_trig: f64,
    ovp_level: f64,
    ovp_enabled: bool,
    tripped: bool,
    isum_enable: u16,
    isum_event: u16,
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            high_range: false,
            voltage: 0.0,
            current: LOW_RANGE.curr_def,
            volt_step: 0.001,
            curr_step: 0.0001,
            volt_trig: 0.0,
            curr_trig: LOW_RANGE.curr_def,
            ovp_level: OVP_MAX,
            ovp_enabled: true,
            tripped: false,
            isum_enable: 0,
            isum_event: 0,
        }
    }
}

impl Channel {
    fn limits(&self) -> Limits {
        if self.high_range {
            HIGH_RANGE
        } else {
            LOW_RANGE
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regulation {
    Off,
    ConstantVoltage,
    ConstantCurrent,
}

/// SCPI error queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScpiError {
    code: i32,
    message: &'static str,
}

const UNDEFINED_HEADER: ScpiError = ScpiError {
    code: -113,
    message: "Undefined header",
};
const MISSING_PARAMETER: ScpiError = ScpiError {
    code: -109,
    message: "Missing parameter",
};
const PARAMETER_NOT_ALLOWED: ScpiError = ScpiError {
    code: -108,
    message: "Parameter not allowed",
};
const DATA_OUT_OF_RANGE: ScpiError = ScpiError {
    code: -222,
    message: "Data out of range",
};
const ILLEGAL_PARAMETER: ScpiError = ScpiError {
    code: -224,
    message: "Illegal parameter value",
};
const QUEUE_OVERFLOW: ScpiError = ScpiError {
    code: -350,
    message: "Queue overflow",
};

type Handled = Result<Option<String>, ScpiError>;

#[derive(Debug, Clone)]
pub struct SimulatedSupply {
    channels: [Channel; 2],
    loads: [Option<f64>; 2],
    selected: usize,
    output_on: bool,
    relay: bool,
    coupled: bool,
    trigger_bus: bool,
    trigger_delay: f64,
    armed: bool,
    display_on: bool,
    display_text: Option<String>,
    errors: VecDeque<ScpiError>,
    ese: u8,
    esr: u8,
    sre: u8,
    psc: bool,
    ques_enable: u16,
    ques_inst_enable: u16,
    memory: [Option<[Channel; 2]>; MEMORY_SLOTS],
    memory_names: [String; MEMORY_SLOTS],
    timeout_ms: u32,
}

impl Default for SimulatedSupply {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSupply {
    pub fn new() -> Self {
        Self {
            channels: [Channel::default(); 2],
            loads: [None; 2],
            selected: 0,
            output_on: false,
            relay: false,
            coupled: false,
            trigger_bus: true,
            trigger_delay: 0.0,
            armed: false,
            display_on: true,
            display_text: None,
            errors: VecDeque::new(),
            ese: 0,
            esr: 0,
            sre: 0,
            psc: true,
            ques_enable: 0,
            ques_inst_enable: 0,
            memory: [None; MEMORY_SLOTS],
            memory_names: Default::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Connects a resistive load to output 1 or 2.
    pub fn with_load(mut self, output: usize, ohms: f64) -> Self {
        if let Some(slot) = output.checked_sub(1).and_then(|i| self.loads.get_mut(i)) {
            *slot = Some(ohms);
        }
        self
    }

    pub fn pending_errors(&self) -> usize {
        self.errors.len()
    }

    fn reset(&mut self) {
        self.channels = [Channel::default(); 2];
        self.selected = 0;
        self.output_on = false;
        self.relay = false;
        self.coupled = false;
        self.trigger_bus = true;
        self.trigger_delay = 0.0;
        self.armed = false;
        self.display_on = true;
        self.display_text = None;
    }

    fn push_error(&mut self, err: ScpiError) {
        if self.errors.len() + 1 >= ERROR_QUEUE_DEPTH {
            if self.errors.back() != Some(&QUEUE_OVERFLOW) {
                self.errors.push_back(QUEUE_OVERFLOW);
            }
            return;
        }
        self.esr |= if err == UNDEFINED_HEADER { ESR_CME } else { ESR_EXE };
        self.errors.push_back(err);
    }

    fn ch(&self) -> &Channel {
        &self.channels[self.selected]
    }

    fn ch_mut(&mut self) -> &mut Channel {
        &mut self.channels[self.selected]
    }

    fn regulation(&self, idx: usize) -> (f64, f64, Regulation) {
        let ch = &self.channels[idx];
        if !self.output_on || ch.tripped {
            return (0.0, 0.0, Regulation::Off);
        }
        match self.loads[idx] {
            None => (ch.voltage, 0.0, Regulation::ConstantVoltage),
            Some(ohms) if ohms <= 0.0 => (0.0, ch.current, Regulation::ConstantCurrent),
            Some(ohms) => {
                let amps = ch.voltage / ohms;
                if amps > ch.current {
                    (ch.current * ohms, ch.current, Regulation::ConstantCurrent)
                } else {
                    (ch.voltage, amps, Regulation::ConstantVoltage)
                }
            }
        }
    }

    fn isum_condition(&self, idx: usize) -> u16 {
        let mut cond = match self.regulation(idx).2 {
            Regulation::Off => 0,
            Regulation::ConstantVoltage => ISUM_CV,
            Regulation::ConstantCurrent => ISUM_CC,
        };
        if self.channels[idx].tripped {
            cond |= ISUM_OV;
        }
        cond
    }

    fn inst_condition(&self) -> u16 {
        (0..2)
            .filter(|&i| self.isum_condition(i) & self.channels[i].isum_enable != 0)
            .fold(0, |acc, i| acc | (1 << (i + 1)))
    }

    fn ques_condition(&self) -> u16 {
        if self.inst_condition() & self.ques_inst_enable != 0 {
            QUES_ISUM
        } else {
            0
        }
    }

    fn status_byte(&self) -> u8 {
        let mut stb = 0u8;
        if !self.errors.is_empty() {
            stb |= 1 << 2;
        }
        if self.ques_condition() & self.ques_enable != 0 {
            stb |= 1 << 3;
        }
        if self.esr & self.ese != 0 {
            stb |= 1 << 5;
        }
        if stb & self.sre != 0 {
            stb |= 1 << 6;
        }
        stb
    }

    /// Trips overvoltage protection and latches event bits after a change.
    fn settle(&mut self) {
        for i in 0..2 {
            let ch = self.channels[i];
            if self.output_on && ch.ovp_enabled && !ch.tripped && ch.voltage > ch.ovp_level {
                tracing::debug!(
                    output = i + 1,
                    level = ch.ovp_level,
                    "overvoltage protection tripped"
                );
                self.channels[i].tripped = true;
            }
            let cond = self.isum_condition(i);
            self.channels[i].isum_event |= cond;
        }
    }

    fn fire_trigger(&mut self) {
        if !self.armed {
            return;
        }
        for ch in self.channels.iter_mut() {
            ch.voltage = ch.volt_trig;
            ch.current = ch.curr_trig;
        }
        self.armed = false;
        self.esr |= ESR_OPC;
    }

    fn handle(&mut self, line: &str) -> Handled {
        let line = line.trim();
        let (head, rest) = match line.find(char::is_whitespace) {
            Some(at) => (&line[..at], line[at..].trim()),
            None => (line, ""),
        };
        let (head, query) = match head.strip_suffix('?') {
            Some(h) => (h, true),
            None => (head, false),
        };
        if !head.is_ascii() {
            return Err(UNDEFINED_HEADER);
        }
        let args = split_args(rest);
        let (path, suffix) = normalize(head);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        match (path.as_str(), query) {
            ("*IDN", true) => reply(IDN),
            ("*RST", false) => {
                self.reset();
                done()
            }
            ("*CLS", false) => {
                self.errors.clear();
                self.esr = 0;
                for ch in self.channels.iter_mut() {
                    ch.isum_event = 0;
                }
                done()
            }
            ("*ESE", false) => {
                self.ese = register(&args, 255)? as u8;
                done()
            }
            ("*ESE", true) => reply(self.ese),
            ("*ESR", true) => {
                let esr = self.esr;
                self.esr = 0;
                reply(esr)
            }
            ("*OPC", false) => {
                self.esr |= ESR_OPC;
                done()
            }
            ("*OPC", true) => reply(1),
            ("*PSC", false) => {
                self.psc = register(&args, 1)? == 1;
                done()
            }
            ("*PSC", true) => reply(u8::from(self.psc)),
            ("*SAV", false) => {
                let slot = memory_slot(&args)?;
                self.memory[slot] = Some(self.channels);
                done()
            }
            ("*RCL", false) => {
                let slot = memory_slot(&args)?;
                let saved = self.memory[slot].ok_or(ILLEGAL_PARAMETER)?;
                self.channels = saved;
                self.output_on = false;
                done()
            }
            ("*SRE", false) => {
                self.sre = register(&args, 255)? as u8;
                done()
            }
            ("*SRE", true) => reply(self.sre),
            ("*STB", true) => reply(self.status_byte()),
            ("*TRG", false) => {
                if self.trigger_bus {
                    self.fire_trigger();
                }
                done()
            }
            ("*TST", true) => reply("+0"),
            ("*WAI", false) => done(),

            ("APPL", false) => {
                let voltage = args.first().ok_or(MISSING_PARAMETER)?;
                if args.len() > 2 {
                    return Err(PARAMETER_NOT_ALLOWED);
                }
                let limits = self.ch().limits();
                let v = parse_level(voltage, self.ch().voltage, limits.volt_max, 0.0, 0.0)?;
                let i = match args.get(1) {
                    Some(arg) => {
                        parse_level(arg, self.ch().current, limits.curr_max, limits.curr_def, 0.0)?
                    }
                    None => self.ch().current,
                };
                let ch = self.ch_mut();
                ch.voltage = v;
                ch.current = i;
                done()
            }
            ("APPL", true) => {
                let ch = self.ch();
                reply(format!("\"{:.6},{:.6}\"", ch.voltage, ch.current))
            }

            ("INST:SEL", false) => {
                let arg = single(&args)?.to_ascii_uppercase();
                self.selected = match arg.as_str() {
                    "OUTP1" | "OUT1" => 0,
                    "OUTP2" | "OUT2" => 1,
                    _ => return Err(ILLEGAL_PARAMETER),
                };
                done()
            }
            ("INST:SEL", true) => reply(format!("OUTP{}", self.selected + 1)),
            ("INST:NSEL", false) => {
                self.selected = match register(&args, 2)? {
                    1 => 0,
                    2 => 1,
                    _ => return Err(DATA_OUT_OF_RANGE),
                };
                done()
            }
            ("INST:NSEL", true) => reply(self.selected + 1),
            ("INST:COUP", false) => {
                self.coupled = switch(&args)?;
                done()
            }
            ("INST:COUP", true) => reply(u8::from(self.coupled)),

            ("MEAS:VOLT", true) => reply(scpi_float(self.regulation(self.selected).0)),
            ("MEAS:CURR", true) => reply(scpi_float(self.regulation(self.selected).1)),

            ("OUTP", false) => {
                self.output_on = switch(&args)?;
                done()
            }
            ("OUTP", true) => reply(u8::from(self.output_on)),
            ("OUTP:REL", false) => {
                self.relay = switch(&args)?;
                done()
            }
            ("OUTP:REL", true) => reply(u8::from(self.relay)),

            ("VOLT", false) => {
                let ch = *self.ch();
                let v = parse_level(
                    single(&args)?,
                    ch.voltage,
                    ch.limits().volt_max,
                    0.0,
                    ch.volt_step,
                )?;
                self.ch_mut().voltage = v;
                done()
            }
            ("VOLT", true) => {
                let ch = *self.ch();
                limit_or(&args, ch.voltage, 0.0, ch.limits().volt_max)
            }
            ("VOLT:STEP", false) => {
                let ch = *self.ch();
                self.ch_mut().volt_step = parse_level(
                    single(&args)?,
                    ch.volt_step,
                    ch.limits().volt_max,
                    0.001,
                    0.0,
                )?;
                done()
            }
            ("VOLT:STEP", true) => reply(scpi_float(self.ch().volt_step)),
            ("VOLT:TRIG", false) => {
                let ch = *self.ch();
                self.ch_mut().volt_trig = parse_level(
                    single(&args)?,
                    ch.volt_trig,
                    ch.limits().volt_max,
                    0.0,
                    0.0,
                )?;
                done()
            }
            ("VOLT:TRIG", true) => {
                let ch = *self.ch();
                limit_or(&args, ch.volt_trig, 0.0, ch.limits().volt_max)
            }
            ("VOLT:PROT", false) => {
                let ch = *self.ch();
                self.ch_mut().ovp_level =
                    parse_level(single(&args)?, ch.ovp_level, OVP_MAX, OVP_MAX, 0.0)?;
                done()
            }
            ("VOLT:PROT", true) => limit_or(&args, self.ch().ovp_level, 0.0, OVP_MAX),
            ("VOLT:PROT:STAT", false) => {
                self.ch_mut().ovp_enabled = switch(&args)?;
                done()
            }
            ("VOLT:PROT:STAT", true) => reply(u8::from(self.ch().ovp_enabled)),
            ("VOLT:PROT:TRIP", true) => reply(u8::from(self.ch().tripped)),
            ("VOLT:PROT:CLE", false) => {
                self.ch_mut().tripped = false;
                done()
            }
            ("VOLT:RANG", false) => {
                let high = match single(&args)?.to_ascii_uppercase().as_str() {
                    "P8V" | "LOW" => false,
                    "P20V" | "HIGH" => true,
                    _ => return Err(ILLEGAL_PARAMETER),
                };
                let ch = self.ch_mut();
                ch.high_range = high;
                let limits = ch.limits();
                ch.voltage = ch.voltage.min(limits.volt_max);
                ch.current = ch.current.min(limits.curr_max);
                done()
            }
            ("VOLT:RANG", true) => reply(if self.ch().high_range { "P20V" } else { "P8V" }),

            ("CURR", false) => {
                let ch = *self.ch();
                let limits = ch.limits();
                let i = parse_level(
                    single(&args)?,
                    ch.current,
                    limits.curr_max,
                    limits.curr_def,
                    ch.curr_step,
                )?;
                self.ch_mut().current = i;
                done()
            }
            ("CURR", true) => {
                let ch = *self.ch();
                limit_or(&args, ch.current, 0.0, ch.limits().curr_max)
            }
            ("CURR:STEP", false) => {
                let ch = *self.ch();
                self.ch_mut().curr_step = parse_level(
                    single(&args)?,
                    ch.curr_step,
                    ch.limits().curr_max,
                    0.0001,
                    0.0,
                )?;
                done()
            }
            ("CURR:STEP", true) => reply(scpi_float(self.ch().curr_step)),
            ("CURR:TRIG", false) => {
                let ch = *self.ch();
                let limits = ch.limits();
                self.ch_mut().curr_trig = parse_level(
                    single(&args)?,
                    ch.curr_trig,
                    limits.curr_max,
                    limits.curr_def,
                    0.0,
                )?;
                done()
            }
            ("CURR:TRIG", true) => {
                let ch = *self.ch();
                limit_or(&args, ch.curr_trig, 0.0, ch.limits().curr_max)
            }

            ("TRIG:DEL", false) => {
                self.trigger_delay =
                    parse_level(single(&args)?, self.trigger_delay, 3600.0, 0.0, 0.0)?;
                done()
            }
            ("TRIG:DEL", true) => limit_or(&args, self.trigger_delay, 0.0, 3600.0),
            ("TRIG:SOUR", false) => {
                self.trigger_bus = match single(&args)?.to_ascii_uppercase().as_str() {
                    "BUS" => true,
                    "IMM" | "IMMEDIATE" => false,
                    _ => return Err(ILLEGAL_PARAMETER),
                };
                done()
            }
            ("TRIG:SOUR", true) => reply(if self.trigger_bus { "BUS" } else { "IMM" }),
            ("INIT", false) => {
                self.armed = true;
                if !self.trigger_bus {
                    self.fire_trigger();
                }
                done()
            }

            ("DISP", false) => {
                self.display_on = switch(&args)?;
                done()
            }
            ("DISP", true) => reply(u8::from(self.display_on)),
            ("DISP:TEXT", false) => {
                let text = single(&args)?;
                if text.len() > 11 {
                    return Err(DATA_OUT_OF_RANGE);
                }
                self.display_text = Some(text.to_string());
                done()
            }
            ("DISP:TEXT", true) => reply(format!(
                "\"{}\"",
                self.display_text.as_deref().unwrap_or_default()
            )),
            ("DISP:TEXT:CLE", false) => {
                self.display_text = None;
                done()
            }

            ("MEM:STAT:NAME", false) => {
                let slot = memory_slot(&args[..args.len().min(1)])?;
                let name = args.get(1).copied().unwrap_or_default();
                if name.len() > 12 {
                    return Err(DATA_OUT_OF_RANGE);
                }
                self.memory_names[slot] = name.to_string();
                done()
            }
            ("MEM:STAT:NAME", true) => {
                let slot = memory_slot(&args)?;
                reply(format!("\"{}\"", self.memory_names[slot]))
            }

            ("SYST:BEEP", false)
            | ("SYST:RWL", false)
            | ("SYST:REM", false)
            | ("SYST:LOC", false) => done(),
            ("SYST:ERR", true) => {
                let err = self.errors.pop_front();
                reply(match err {
                    Some(e) => format!("{},\"{}\"", e.code, e.message),
                    None => "+0,\"No error\"".to_string(),
                })
            }
            ("SYST:VERS", true) => reply(SCPI_VERSION),

            ("STAT:QUES:COND", true) => reply(self.ques_condition()),
            ("STAT:QUES:EVEN", true) => reply(self.ques_condition()),
            ("STAT:QUES:ENAB", false) => {
                self.ques_enable = register(&args, u16::MAX as i64)? as u16;
                done()
            }
            ("STAT:QUES:ENAB", true) => reply(self.ques_enable),
            ("STAT:QUES:INST:EVEN", true) => reply(self.inst_condition()),
            ("STAT:QUES:INST:ENAB", false) => {
                self.ques_inst_enable = register(&args, u16::MAX as i64)? as u16;
                done()
            }
            ("STAT:QUES:INST:ENAB", true) => reply(self.ques_inst_enable),
            ("STAT:QUES:INST:ISUM:COND", true) => {
                let idx = isum_index(suffix)?;
                reply(self.isum_condition(idx))
            }
            ("STAT:QUES:INST:ISUM:EVEN", true) => {
                let idx = isum_index(suffix)?;
                let event = self.channels[idx].isum_event;
                self.channels[idx].isum_event = 0;
                reply(event)
            }
            ("STAT:QUES:INST:ISUM:ENAB", false) => {
                let idx = isum_index(suffix)?;
                self.channels[idx].isum_enable = register(&args, u16::MAX as i64)? as u16;
                done()
            }
            ("STAT:QUES:INST:ISUM:ENAB", true) => {
                let idx = isum_index(suffix)?;
                reply(self.channels[idx].isum_enable)
            }

            _ => Err(UNDEFINED_HEADER),
        }
    }
}

impl Instrument for SimulatedSupply {
    fn write(&mut self, line: &str) -> InstrumentResult<()> {
        if let Err(err) = self.handle(line) {
            tracing::debug!(%line, code = err.code, "simulated supply error");
            self.push_error(err);
        }
        self.settle();
        Ok(())
    }

    fn query(&mut self, line: &str) -> InstrumentResult<String> {
        let handled = self.handle(line);
        self.settle();
        match handled {
            Ok(Some(reply)) => Ok(reply),
            // a real supply stays silent after a bad query; the driver times out
            Ok(None) => Err(InstrumentError::Timeout {
                timeout_ms: self.timeout_ms,
            }),
            Err(err) => {
                self.push_error(err);
                Err(InstrumentError::Timeout {
                    timeout_ms: self.timeout_ms,
                })
            }
        }
    }

    fn io_timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    fn set_io_timeout_ms(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
    }
}

fn done() -> Handled {
    Ok(None)
}

fn reply(value: impl ToString) -> Handled {
    Ok(Some(value.to_string()))
}

fn single<'a>(args: &[&'a str]) -> Result<&'a str, ScpiError> {
    match args {
        [] => Err(MISSING_PARAMETER),
        [one] => Ok(one),
        _ => Err(PARAMETER_NOT_ALLOWED),
    }
}

fn switch(args: &[&str]) -> Result<bool, ScpiError> {
    match single(args)?.to_ascii_uppercase().as_str() {
        "ON" | "1" => Ok(true),
        "OFF" | "0" => Ok(false),
        _ => Err(ILLEGAL_PARAMETER),
    }
}

fn register(args: &[&str], max: i64) -> Result<i64, ScpiError> {
    let value: i64 = single(args)?
        .trim_start_matches('+')
        .parse()
        .map_err(|_| ILLEGAL_PARAMETER)?;
    if (0..=max).contains(&value) {
        Ok(value)
    } else {
        Err(DATA_OUT_OF_RANGE)
    }
}

fn memory_slot(args: &[&str]) -> Result<usize, ScpiError> {
    match register(args, MEMORY_SLOTS as i64)? {
        0 => Err(DATA_OUT_OF_RANGE),
        n => Ok(n as usize - 1),
    }
}

fn isum_index(suffix: Option<u32>) -> Result<usize, ScpiError> {
    match suffix {
        Some(1) => Ok(0),
        Some(2) => Ok(1),
        _ => Err(UNDEFINED_HEADER),
    }
}

/// Parses `<numeric>|MIN|MAX|DEF|UP|DOWN` against `[0, max]`.
fn parse_level(arg: &str, current: f64, max: f64, def: f64, step: f64) -> Result<f64, ScpiError> {
    let upper = arg.trim().to_ascii_uppercase();
    let value = if upper.starts_with("MIN") {
        0.0
    } else if upper.starts_with("MAX") {
        max
    } else if upper.starts_with("DEF") {
        def
    } else if upper == "UP" {
        current + step
    } else if upper == "DOWN" {
        current - step
    } else {
        upper.parse::<f64>().map_err(|_| ILLEGAL_PARAMETER)?
    };
    if value < -1e-9 || value > max + 1e-9 {
        return Err(DATA_OUT_OF_RANGE);
    }
    Ok(value.clamp(0.0, max))
}

/// Answers `<node>? [MIN|MAX]`.
fn limit_or(args: &[&str], current: f64, min: f64, max: f64) -> Handled {
    let value = match args {
        [] => current,
        [arg] => match arg.to_ascii_uppercase().as_str() {
            a if a.starts_with("MIN") => min,
            a if a.starts_with("MAX") => max,
            _ => return Err(ILLEGAL_PARAMETER),
        },
        _ => return Err(PARAMETER_NOT_ALLOWED),
    };
    reply(scpi_float(value))
}

/// `+1.25000000E+01` style NR3 formatting.
fn scpi_float(value: f64) -> String {
    let formatted = format!("{:.8E}", value.abs());
    let (mantissa, exponent) = formatted.split_once('E').unwrap_or((&formatted, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    format!(
        "{}{}E{}{:02}",
        if value < 0.0 { '-' } else { '+' },
        mantissa,
        if exponent < 0 { '-' } else { '+' },
        exponent.abs()
    )
}

/// Splits program data on commas outside quoted strings and unquotes
/// string arguments.
fn split_args(rest: &str) -> Vec<String> {
    if rest.is_empty() {
        return Vec::new();
    }
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => args.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    args.push(current.trim().to_string());
    args
}

/// Reduces a header to the short-form path used internally and pulls out a
/// numeric suffix (`ISUMmary2` -> `ISUM`, `Some(2)`). Optional nodes are
/// dropped (`SOURce:VOLTage:LEVel:IMMediate` -> `VOLT`).
fn normalize(header: &str) -> (String, Option<u32>) {
    let mut suffix = None;
    let mut parts: Vec<String> = Vec::new();
    for raw in header.trim_start_matches(':').split(':') {
        let upper = raw.to_ascii_uppercase();
        let alpha_len = upper
            .trim_end_matches(|c: char| c.is_ascii_digit())
            .len();
        let (word, digits) = upper.split_at(alpha_len);
        if !digits.is_empty() && !word.starts_with('*') {
            suffix = digits.parse().ok();
        }
        parts.push(short_form(word));
    }

    if parts.first().map(String::as_str) == Some("SOUR") {
        parts.remove(0);
    }
    let optional = |p: &str| matches!(p, "LEV" | "IMM" | "AMPL" | "DC" | "STAT" | "TRIG");
    let root = parts.first().cloned();
    match root.as_deref() {
        Some("VOLT") | Some("CURR") if parts.len() > 1 => {
            // VOLT:PROT:STAT and VOLT:TRIG are real nodes, LEV/IMM/AMPL are not
            parts.retain(|p| !matches!(p.as_str(), "LEV" | "IMM" | "AMPL"));
        }
        Some("MEAS") | Some("OUTP") | Some("DISP") | Some("INIT") | Some("INST") => {
            let first = parts.remove(0);
            let mut kept: Vec<String> = parts
                .into_iter()
                .filter(|p| !optional(p.as_str()))
                .collect();
            kept.insert(0, first);
            parts = kept;
        }
        _ => {}
    }
    if parts.len() == 1 && parts[0] == "INST" {
        parts.push("SEL".to_string());
    }
    (parts.join(":"), suffix)
}

/// SCPI short form: the first four letters, or three when the fourth is a
/// vowel. Common commands and short mnemonics pass through.
fn short_form(word: &str) -> String {
    if word.starts_with('*') || word.chars().count() <= 4 {
        return word.to_string();
    }
    let take = match word.chars().nth(3) {
        Some('A' | 'E' | 'I' | 'O' | 'U') => 3,
        _ => 4,
    };
    word.chars().take(take).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(sim: &mut SimulatedSupply, line: &str) -> String {
        sim.query(line).unwrap()
    }

    #[test]
    fn short_forms() {
        assert_eq!(short_form("VOLTAGE"), "VOLT");
        assert_eq!(short_form("SELECT"), "SEL");
        assert_eq!(short_form("ERROR"), "ERR");
        assert_eq!(short_form("DELAY"), "DEL");
        assert_eq!(short_form("ISUM"), "ISUM");
        assert_eq!(short_form("VÄÄX"), "VÄÄX");
        assert_eq!(short_form("VOLTÄGE"), "VOLT");
    }

    #[test]
    fn long_headers_normalize() {
        assert_eq!(normalize("SOURce:VOLTage:LEVel:IMMediate").0, "VOLT");
        assert_eq!(normalize("VOLTage:PROTection:STATe").0, "VOLT:PROT:STAT");
        assert_eq!(normalize("MEASure:VOLTage:DC").0, "MEAS:VOLT");
        assert_eq!(normalize("OUTPut:STATe").0, "OUTP");
        assert_eq!(normalize("INSTrument").0, "INST:SEL");
        assert_eq!(normalize("INST:COUP:TRIG").0, "INST:COUP");
        assert_eq!(
            normalize("STATus:QUEStionable:INSTrument:ISUMmary2:CONDition"),
            ("STAT:QUES:INST:ISUM:COND".to_string(), Some(2))
        );
    }

    #[test]
    fn program_and_measure_open_circuit() {
        let mut sim = SimulatedSupply::new();
        sim.write("INST:SEL OUTP1").unwrap();
        sim.write("APPL 5,1").unwrap();
        sim.write("OUTP ON").unwrap();
        assert_eq!(q(&mut sim, "MEAS:VOLT?"), "+5.00000000E+00");
        assert_eq!(q(&mut sim, "MEAS:CURR?"), "+0.00000000E+00");
        assert_eq!(q(&mut sim, "APPL?"), "\"5.000000,1.000000\"");
        assert_eq!(q(&mut sim, "SYST:ERR?"), "+0,\"No error\"");
    }

    #[test]
    fn loaded_output_goes_constant_current() {
        let mut sim = SimulatedSupply::new().with_load(2, 2.0);
        sim.write("INST:NSEL 2").unwrap();
        sim.write("VOLT 6").unwrap();
        sim.write("CURR 1").unwrap();
        sim.write("OUTP ON").unwrap();
        assert_eq!(q(&mut sim, "MEAS:CURR?"), "+1.00000000E+00");
        assert_eq!(q(&mut sim, "MEAS:VOLT?"), "+2.00000000E+00");
        assert_eq!(q(&mut sim, "STAT:QUES:INST:ISUM2:COND?"), "1");
    }

    #[test]
    fn out_of_range_is_queued_not_raised() {
        let mut sim = SimulatedSupply::new();
        sim.write("VOLT 99").unwrap();
        assert_eq!(sim.pending_errors(), 1);
        assert_eq!(q(&mut sim, "SYST:ERR?"), "-222,\"Data out of range\"");
        assert_eq!(q(&mut sim, "VOLT?"), "+0.00000000E+00");
    }

    #[test]
    fn non_ascii_header_is_undefined() {
        let mut sim = SimulatedSupply::new().with_timeout_ms(300);
        sim.write("VÄÄX 1").unwrap();
        sim.write("VOLTÄGE 1").unwrap();
        assert_eq!(sim.pending_errors(), 2);
        assert_eq!(q(&mut sim, "SYST:ERR?"), "-113,\"Undefined header\"");
        assert_eq!(q(&mut sim, "SYST:ERR?"), "-113,\"Undefined header\"");
        let err = sim.query("MEASÜRE:VOLT?").unwrap_err();
        assert!(matches!(err, InstrumentError::Timeout { timeout_ms: 300 }));
        assert_eq!(q(&mut sim, "VOLT?"), "+0.00000000E+00");
    }

    #[test]
    fn unknown_query_times_out() {
        let mut sim = SimulatedSupply::new().with_timeout_ms(300);
        let err = sim.query("BOGUS?").unwrap_err();
        assert!(matches!(err, InstrumentError::Timeout { timeout_ms: 300 }));
        assert_eq!(q(&mut sim, "SYST:ERR?"), "-113,\"Undefined header\"");
    }

    #[test]
    fn up_down_use_step() {
        let mut sim = SimulatedSupply::new();
        sim.write("VOLT 1").unwrap();
        sim.write("VOLT:STEP 0.5").unwrap();
        sim.write("VOLT UP").unwrap();
        assert_eq!(q(&mut sim, "VOLT?"), "+1.50000000E+00");
        sim.write("VOLT DOWN").unwrap();
        sim.write("VOLT DOWN").unwrap();
        assert_eq!(q(&mut sim, "VOLT?"), "+5.00000000E-01");
        assert_eq!(q(&mut sim, "VOLT? MAX"), "+8.24000000E+00");
    }

    #[test]
    fn overvoltage_trips_and_clears() {
        let mut sim = SimulatedSupply::new();
        sim.write("VOLT:RANG P20V").unwrap();
        sim.write("VOLT:PROT 10").unwrap();
        sim.write("VOLT 12").unwrap();
        sim.write("OUTP ON").unwrap();
        assert_eq!(q(&mut sim, "VOLT:PROT:TRIP?"), "1");
        assert_eq!(q(&mut sim, "MEAS:VOLT?"), "+0.00000000E+00");
        sim.write("VOLT 9").unwrap();
        sim.write("VOLT:PROT:CLE").unwrap();
        assert_eq!(q(&mut sim, "VOLT:PROT:TRIP?"), "0");
    }

    #[test]
    fn bus_trigger_applies_pending_levels() {
        let mut sim = SimulatedSupply::new();
        sim.write("TRIG:SOUR BUS").unwrap();
        sim.write("VOLT:TRIG 3").unwrap();
        sim.write("INIT").unwrap();
        assert_eq!(q(&mut sim, "VOLT?"), "+0.00000000E+00");
        sim.write("*TRG").unwrap();
        assert_eq!(q(&mut sim, "VOLT?"), "+3.00000000E+00");
    }

    #[test]
    fn display_text_round_trips_quotes() {
        let mut sim = SimulatedSupply::new();
        sim.write("DISP:TEXT \"HELLO\"").unwrap();
        assert_eq!(q(&mut sim, "DISP:TEXT?"), "\"HELLO\"");
        sim.write("MEM:STAT:NAME 2,\"BURN,IN\"").unwrap();
        assert_eq!(q(&mut sim, "MEM:STAT:NAME? 2"), "\"BURN,IN\"");
    }
}
