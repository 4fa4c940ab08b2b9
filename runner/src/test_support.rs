//! Test-only helpers: scripted launchers and session plans.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;

use anyhow::{Result, anyhow};

use crate::core::args::{ArgOverrides, LaunchSettings};
use crate::core::value::ArgTable;
use crate::io::process::{LaunchRequest, Launcher, RunOutput};
use crate::session::SessionPlan;

/// One scripted launch result.
#[derive(Debug, Clone)]
pub enum ScriptedRun {
    Exit {
        exit_code: Option<i32>,
        stdout: String,
    },
    /// The launch fails as if the interpreter could not be started.
    SpawnError(String),
}

impl ScriptedRun {
    pub fn exit(code: i32, stdout: &str) -> Self {
        ScriptedRun::Exit {
            exit_code: Some(code),
            stdout: stdout.to_string(),
        }
    }
}

/// Launcher that replays queued results and records every request.
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    runs: RefCell<VecDeque<ScriptedRun>>,
    calls: RefCell<Vec<LaunchRequest>>,
}

impl ScriptedLauncher {
    pub fn new(runs: Vec<ScriptedRun>) -> Self {
        Self {
            runs: RefCell::new(runs.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Requests received so far, in order.
    pub fn calls(&self) -> Vec<LaunchRequest> {
        self.calls.borrow().clone()
    }
}

impl Launcher for ScriptedLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<RunOutput> {
        self.calls.borrow_mut().push(request.clone());
        match self.runs.borrow_mut().pop_front() {
            Some(ScriptedRun::Exit { exit_code, stdout }) => Ok(RunOutput {
                exit_code,
                stdout: stdout.into_bytes(),
            }),
            Some(ScriptedRun::SpawnError(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted launcher exhausted")),
        }
    }
}

/// Launch settings for a `node bin/protractor` style runner.
pub fn launch_settings() -> LaunchSettings {
    LaunchSettings {
        interpreter: "node".to_string(),
        interpreter_flags: Vec::new(),
        entrypoint: "bin/protractor".to_string(),
        config_file: None,
        no_color: false,
        debug: false,
    }
}

/// Session plan with no options, no output file, and the given specs.
pub fn plan_with_specs(specs: &[&str], keep_alive: bool) -> SessionPlan {
    SessionPlan {
        launch: launch_settings(),
        options: ArgTable::new(),
        overrides: ArgOverrides::new(),
        initial_specs: specs.iter().map(|s| s.to_string()).collect(),
        keep_alive,
        output: None,
        project_root: PathBuf::from("/project"),
    }
}
