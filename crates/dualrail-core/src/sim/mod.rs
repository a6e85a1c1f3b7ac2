//! Instruments that need no hardware.

mod loopback;
mod supply;

pub use loopback::{Exchange, ExchangeKind, LoopbackInstrument, DEFAULT_TIMEOUT_MS};
pub use supply::SimulatedSupply;
