//! Browser driver update before a session (`webdriver-manager update`).

use std::process::Command;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::io::config::RunnerConfig;

/// Build the driver update command: `<interpreter> <driver_manager> update`.
pub fn update_command(cfg: &RunnerConfig) -> Command {
    let mut cmd = Command::new(&cfg.interpreter);
    cmd.arg(&cfg.driver_manager).arg("update");
    cmd
}

/// Run the driver update with inherited stdio.
///
/// A non-zero exit is logged and tolerated; failing to start the interpreter
/// is an error.
#[instrument(skip_all, fields(driver_manager = %cfg.driver_manager))]
pub fn update_driver(cfg: &RunnerConfig) -> Result<()> {
    info!("updating browser driver");
    let status = update_command(cfg)
        .status()
        .with_context(|| format!("spawn {} {} update", cfg.interpreter, cfg.driver_manager))?;
    if !status.success() {
        warn!(exit_code = ?status.code(), "driver update failed, continuing");
    }
    Ok(())
}
