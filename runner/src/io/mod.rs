//! I/O helpers for runner sessions.

pub mod config;
pub mod driver;
pub mod process;
pub mod tee;
