//! Retry session: run the test runner, rerun failed specs, report the outcome.
//!
//! A session starts with the full spec selection. When a run exits non-zero
//! and keep-alive is on, the failed specs are extracted from its stdout and
//! the runner is started again with only those specs, up to
//! [`MAX_ATTEMPTS`] runs in total. Each attempt gets a freshly built
//! invocation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::args::{ArgOverrides, Invocation, LaunchSettings, build_invocation};
use crate::core::failures::failed_specs;
use crate::core::retry::{Attempt, MAX_ATTEMPTS, SessionState, after_attempt};
use crate::core::specs::{explicit_specs, merge_specs, remap_failed_spec, stage_config_spec};
use crate::core::value::ArgTable;
use crate::io::config::{RunnerConfig, load_config_file_specs};
use crate::io::process::{LaunchRequest, Launcher, OutputTarget};

/// Everything a session needs, resolved from config before the first spawn.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub launch: LaunchSettings,
    pub options: ArgTable,
    pub overrides: ArgOverrides,
    /// Spec selection for the first attempt.
    pub initial_specs: Vec<String>,
    pub keep_alive: bool,
    pub output: Option<OutputTarget>,
    /// Directory the runner is started from; failed spec paths are relative to it.
    pub project_root: PathBuf,
}

impl SessionPlan {
    /// Resolve a plan from config: merge explicit and config-file specs and
    /// check that nested options decode.
    pub fn from_config(
        cfg: &RunnerConfig,
        overrides: ArgOverrides,
        project_root: &Path,
    ) -> Result<Self> {
        let explicit = explicit_specs(&cfg.args, &overrides);
        let from_file: Vec<String> = match &cfg.config_file {
            Some(config_file) => {
                load_config_file_specs(&project_root.join(config_file), &cfg.interpreter)?
                    .iter()
                    .map(|spec| stage_config_spec(spec))
                    .collect()
            }
            None => Vec::new(),
        };
        let initial_specs = merge_specs(&explicit, &from_file);
        debug!(specs = ?initial_specs, "resolved spec selection");

        let plan = Self {
            launch: cfg.launch_settings(),
            options: cfg.args.clone(),
            overrides,
            initial_specs,
            keep_alive: cfg.keep_alive,
            output: cfg.output.as_ref().map(|path| OutputTarget {
                path: project_root.join(path),
                settings: cfg.output_settings.clone(),
            }),
            project_root: project_root.to_path_buf(),
        };
        // Surface malformed options before anything is spawned.
        plan.invocation(&plan.initial_specs)
            .context("translate runner options")?;
        Ok(plan)
    }

    pub fn invocation(&self, specs: &[String]) -> Result<Invocation> {
        build_invocation(&self.launch, &self.options, &self.overrides, specs)
    }
}

/// Progress notifications emitted while a session runs.
#[derive(Debug)]
pub enum SessionEvent<'a> {
    AttemptStarted {
        number: u32,
        specs: &'a [String],
        invocation: &'a Invocation,
    },
    AttemptFinished {
        attempt: &'a Attempt,
    },
    /// A failed attempt will be rerun with `specs`.
    Retrying { next: u32, specs: &'a [String] },
}

/// Terminal result of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Passed,
    Failed {
        exit_code: i32,
        /// True when the attempt budget ran out (as opposed to keep-alive off).
        gave_up: bool,
    },
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub attempts: Vec<Attempt>,
    pub outcome: SessionOutcome,
}

impl SessionReport {
    /// Exit code for the host process: 0, or the last run's failure code.
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            SessionOutcome::Passed => 0,
            SessionOutcome::Failed { exit_code, .. } => exit_code,
        }
    }

    /// Specs rerun at each retry, keyed by attempt number.
    pub fn reruns(&self) -> impl Iterator<Item = (u32, &[String])> {
        self.attempts
            .iter()
            .skip(1)
            .map(|attempt| (attempt.number, attempt.specs.as_slice()))
    }
}

/// Stateful retry controller around a [`Launcher`].
pub struct RetrySession<'a, L: Launcher> {
    launcher: &'a L,
    plan: SessionPlan,
    state: SessionState,
    attempts: Vec<Attempt>,
}

impl<'a, L: Launcher> RetrySession<'a, L> {
    pub fn new(launcher: &'a L, plan: SessionPlan) -> Self {
        Self {
            launcher,
            plan,
            state: SessionState::Idle,
            attempts: Vec::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Run one attempt and transition to the next state.
    ///
    /// Errors (spawn failures, malformed options) abort the session; test
    /// failures are expressed through the returned state.
    #[instrument(skip_all, fields(state = ?self.state))]
    pub fn step<F: FnMut(&SessionEvent<'_>)>(
        &mut self,
        on_event: &mut F,
    ) -> Result<&SessionState> {
        let (number, specs) = match &self.state {
            SessionState::Idle => (1, self.plan.initial_specs.clone()),
            SessionState::RetryPending { attempt, specs } => (*attempt, specs.clone()),
            SessionState::Running { attempt } => {
                return Err(anyhow!("attempt {attempt} is still running"));
            }
            terminal => return Err(anyhow!("session already finished ({terminal:?})")),
        };

        let invocation = self.plan.invocation(&specs)?;
        self.state = SessionState::Running { attempt: number };
        info!(attempt = number, specs = ?specs, "starting attempt");
        on_event(&SessionEvent::AttemptStarted {
            number,
            specs: &specs,
            invocation: &invocation,
        });

        let output = self.launcher.launch(&LaunchRequest {
            invocation,
            output: self.plan.output.clone(),
        })?;

        let mut attempt = Attempt::new(number, specs);
        attempt.exit_code = output.exit_code;
        attempt.output = output.stdout;

        let failed = if output.exit_code == Some(0) {
            Vec::new()
        } else {
            let text = String::from_utf8_lossy(&attempt.output);
            failed_specs(Some(&*text))
                .iter()
                .map(|spec| remap_failed_spec(spec, &self.plan.project_root))
                .collect()
        };

        let next = after_attempt(&attempt, self.plan.keep_alive, failed);
        on_event(&SessionEvent::AttemptFinished { attempt: &attempt });
        match &next {
            SessionState::Success => info!(attempt = number, "tests passed"),
            SessionState::Failed { exit_code } => {
                warn!(attempt = number, exit_code, "tests failed");
            }
            SessionState::GaveUp { exit_code } => {
                warn!(
                    attempt = number,
                    exit_code,
                    max = MAX_ATTEMPTS,
                    "tests failed on every attempt"
                );
            }
            SessionState::RetryPending { attempt: next_number, specs } => {
                if specs.is_empty() {
                    warn!(
                        attempt = number,
                        "non-zero exit without recognizable failed specs, retrying with none selected"
                    );
                }
                info!(next = next_number, specs = ?specs, "retrying failed specs");
                on_event(&SessionEvent::Retrying {
                    next: *next_number,
                    specs,
                });
            }
            SessionState::Idle | SessionState::Running { .. } => {}
        }

        self.attempts.push(attempt);
        self.state = next;
        Ok(&self.state)
    }

    /// Step until the session reaches a terminal state.
    pub fn run<F: FnMut(&SessionEvent<'_>)>(mut self, mut on_event: F) -> Result<SessionReport> {
        while !self.step(&mut on_event)?.is_terminal() {}

        let outcome = match self.state {
            SessionState::Success => SessionOutcome::Passed,
            SessionState::Failed { exit_code } => SessionOutcome::Failed {
                exit_code,
                gave_up: false,
            },
            SessionState::GaveUp { exit_code } => SessionOutcome::Failed {
                exit_code,
                gave_up: true,
            },
            ref other => return Err(anyhow!("session stopped in non-terminal state {other:?}")),
        };
        Ok(SessionReport {
            attempts: self.attempts,
            outcome,
        })
    }
}

/// Run a full session for `plan`.
pub fn run_session<L: Launcher, F: FnMut(&SessionEvent<'_>)>(
    launcher: &L,
    plan: SessionPlan,
    on_event: F,
) -> Result<SessionReport> {
    RetrySession::new(launcher, plan).run(on_event)
}
