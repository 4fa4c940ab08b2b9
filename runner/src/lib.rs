//! Retrying driver for an external end-to-end test runner.
//!
//! The crate turns a structured configuration into the runner's command line,
//! runs it, finds the failed specs in its output and reruns only those, up to
//! three attempts in total. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (argument translation, spec
//!   merging, failure extraction, retry transitions). No I/O.
//! - **[`io`]**: Side-effecting operations (config files, process spawning,
//!   output files). Isolated behind traits to enable scripted tests.
//!
//! [`session`] composes both into the retry loop used by the CLI.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
