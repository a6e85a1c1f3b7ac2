use crate::instrument::Instrument;
use std::ops::{Deref, DerefMut};

/// Scoped override of an instrument's ambient I/O timeout.
///
/// The timeout in effect when the scope was entered is written back when the
/// scope is dropped, on success, on `?` early returns and on unwinding alike.
/// While the scope is alive the instrument is only reachable through it.
pub struct TimeoutScope<'a, I: Instrument + ?Sized> {
    instrument: &'a mut I,
    saved_ms: u32,
    applied: bool,
}

impl<'a, I: Instrument + ?Sized> TimeoutScope<'a, I> {
    /// Saves the current timeout and applies `override_ms` if present.
    /// `None` leaves the ambient timeout untouched.
    pub fn enter(instrument: &'a mut I, override_ms: Option<u32>) -> Self {
        let saved_ms = instrument.io_timeout_ms();
        if let Some(ms) = override_ms {
            tracing::debug!(saved_ms, override_ms = ms, "applying i/o timeout override");
            instrument.set_io_timeout_ms(ms);
        }
        Self {
            instrument,
            saved_ms,
            applied: override_ms.is_some(),
        }
    }

    pub fn saved_ms(&self) -> u32 {
        self.saved_ms
    }
}

impl<I: Instrument + ?Sized> Deref for TimeoutScope<'_, I> {
    type Target = I;

    fn deref(&self) -> &I {
        self.instrument
    }
}

impl<I: Instrument + ?Sized> DerefMut for TimeoutScope<'_, I> {
    fn deref_mut(&mut self) -> &mut I {
        self.instrument
    }
}

impl<I: Instrument + ?Sized> Drop for TimeoutScope<'_, I> {
    fn drop(&mut self) {
        if !self.applied {
            return;
        }
        tracing::debug!(restored_ms = self.saved_ms, "restoring i/o timeout");
        self.instrument.set_io_timeout_ms(self.saved_ms);
    }
}
