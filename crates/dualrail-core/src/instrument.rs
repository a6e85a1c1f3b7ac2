//! Contract consumed from the instrument driver.
//!
//! The driver owns the physical connection (GPIB, RS-232, VISA), line
//! termination and wire-level retries. Steps only need a synchronous write,
//! a synchronous query and read/write access to the ambient I/O timeout.

use thiserror::Error;

/// Failures reported by an instrument driver.
///
/// These are carried through the executor untouched so the host sees exactly
/// what the driver reported.
#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("instrument i/o timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u32 },

    #[error("instrument rejected '{line}': {reason}")]
    Rejected { line: String, reason: String },

    #[error("instrument not connected")]
    NotConnected,

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl InstrumentError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn rejected(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            line: line.into(),
            reason: reason.into(),
        }
    }
}

pub type InstrumentResult<T> = Result<T, InstrumentError>;

/// A SCPI-speaking instrument shared by every step of a test plan.
pub trait Instrument {
    /// Sends a command line. No response is read.
    fn write(&mut self, line: &str) -> InstrumentResult<()>;

    /// Sends a query line and returns the raw response, without terminator.
    fn query(&mut self, line: &str) -> InstrumentResult<String>;

    /// Current ambient I/O timeout in milliseconds.
    fn io_timeout_ms(&self) -> u32;

    fn set_io_timeout_ms(&mut self, timeout_ms: u32);
}

impl<T: Instrument + ?Sized> Instrument for &mut T {
    fn write(&mut self, line: &str) -> InstrumentResult<()> {
        (**self).write(line)
    }

    fn query(&mut self, line: &str) -> InstrumentResult<String> {
        (**self).query(line)
    }

    fn io_timeout_ms(&self) -> u32 {
        (**self).io_timeout_ms()
    }

    fn set_io_timeout_ms(&mut self, timeout_ms: u32) {
        (**self).set_io_timeout_ms(timeout_ms)
    }
}

impl<T: Instrument + ?Sized> Instrument for Box<T> {
    fn write(&mut self, line: &str) -> InstrumentResult<()> {
        (**self).write(line)
    }

    fn query(&mut self, line: &str) -> InstrumentResult<String> {
        (**self).query(line)
    }

    fn io_timeout_ms(&self) -> u32 {
        (**self).io_timeout_ms()
    }

    fn set_io_timeout_ms(&mut self, timeout_ms: u32) {
        (**self).set_io_timeout_ms(timeout_ms)
    }
}
