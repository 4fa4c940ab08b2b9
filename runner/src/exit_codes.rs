//! Stable exit codes for the CLI.
//!
//! A session whose tests fail exits with the test runner's own exit code.

/// All tests passed (possibly after retries).
pub const OK: i32 = 0;
/// Invalid configuration, or the test runner could not be started.
pub const INVALID: i32 = 1;
