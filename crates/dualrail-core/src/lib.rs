pub mod catalog;
pub mod errors;
pub mod executor;
pub mod instrument;
pub mod param;
pub mod publish;
pub mod timeout;
pub mod verdict;

pub mod plan;
pub mod runner;
pub mod step;

pub mod report;
pub mod sim;

pub use executor::{execute, CallContext, Mode, RawValue};
pub use instrument::{Instrument, InstrumentError};
pub use param::Parameter;
pub use verdict::{evaluate_boolean, evaluate_numeric, BooleanRule, NumericRule, Outcome};
