//! Process exit codes. Part of the CLI contract relied on by CI jobs.

pub const OK: i32 = 0;
/// A step failed its verdict or errored on the instrument.
pub const TEST_FAILED: i32 = 1;
/// The plan could not be read or did not validate.
pub const CONFIG_ERROR: i32 = 2;
