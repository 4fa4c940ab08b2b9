//! Child process supervision for a single test runner invocation.
//!
//! The [`Launcher`] trait decouples the retry session from actual process
//! spawning. Tests use scripted launchers that return predetermined outputs.

use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};

use crate::core::args::Invocation;
use crate::io::config::OutputSettings;
use crate::io::tee::OutputTee;

/// Where to persist filtered stdout for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub path: PathBuf,
    pub settings: OutputSettings,
}

/// Parameters for one launch.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub invocation: Invocation,
    pub output: Option<OutputTarget>,
}

/// Outcome of one launch, available once the child has exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Complete stdout of the child.
    pub stdout: Vec<u8>,
}

impl RunOutput {
    pub fn is_error(&self) -> bool {
        self.exit_code != Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Abstraction over spawning the test runner.
pub trait Launcher {
    /// Run the invocation to completion. Errors mean the child could not be
    /// started (or its output could not be collected), not that tests failed.
    fn launch(&self, request: &LaunchRequest) -> Result<RunOutput>;
}

/// Launcher that spawns a real child process.
///
/// stdin and stderr are inherited; stdout is piped, echoed live, captured and
/// optionally teed to a file.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    echo_stdout: bool,
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self { echo_stdout: true }
    }
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture stdout without echoing it to the console.
    pub fn quiet() -> Self {
        Self { echo_stdout: false }
    }
}

impl Launcher for ProcessLauncher {
    #[instrument(skip_all, fields(program = %request.invocation.program, teeing = request.output.is_some()))]
    fn launch(&self, request: &LaunchRequest) -> Result<RunOutput> {
        let mut cmd = Command::new(&request.invocation.program);
        cmd.args(&request.invocation.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        debug!(args = ?request.invocation.args, "spawning test runner");
        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                error!(err = %e, "failed to spawn test runner");
                return Err(e).with_context(|| format!("spawn {}", request.invocation.program));
            }
        };

        // The output file is only touched once the runner is actually running.
        let tee = match &request.output {
            Some(target) => match OutputTee::open(&target.path, &target.settings) {
                Ok(tee) => Some(tee),
                Err(e) => {
                    if let Err(kill_err) = child.kill() {
                        warn!(err = %kill_err, "failed to kill test runner");
                    }
                    let _ = child.wait();
                    return Err(e);
                }
            },
            None => None,
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let echo = self.echo_stdout.then(std::io::stdout);
        let stdout_handle = thread::spawn(move || pump_stdout(stdout, echo, tee));

        let status = child.wait().context("wait for test runner")?;
        let stdout = match stdout_handle.join() {
            Ok(result) => result.context("read test runner stdout")?,
            Err(_) => return Err(anyhow!("stdout reader thread panicked")),
        };

        debug!(exit_code = ?status.code(), bytes = stdout.len(), "test runner finished");
        Ok(RunOutput {
            exit_code: status.code(),
            stdout,
        })
    }
}

/// Drain `reader` chunk by chunk.
///
/// Every chunk is echoed and collected as soon as it is read, so progress
/// output without newlines shows up live. The tee only sees whole lines; a
/// partial line is carried over to the next chunk and flushed at EOF.
fn pump_stdout<R: Read, E: Write, W: Write>(
    mut reader: R,
    mut echo: Option<E>,
    mut tee: Option<OutputTee<W>>,
) -> Result<Vec<u8>> {
    let mut collected = Vec::new();
    let mut pending = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("read output"),
        };
        let bytes = &chunk[..n];

        if let Some(console) = echo.as_mut()
            && let Err(e) = console.write_all(bytes).and_then(|()| console.flush())
        {
            warn!(err = %e, "failed to echo test runner output");
        }

        if let Some(writer) = tee.as_mut() {
            pending.extend_from_slice(bytes);
            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                if let Err(e) = writer.write_line(&line) {
                    warn!(err = %e, "failed to write output file");
                }
            }
        }

        collected.extend_from_slice(bytes);
    }

    if let Some(mut writer) = tee {
        if !pending.is_empty()
            && let Err(e) = writer.write_line(&pending)
        {
            warn!(err = %e, "failed to write output file");
        }
        if let Err(e) = writer.finish() {
            warn!(err = %e, "failed to flush output file");
        }
    }

    Ok(collected)
}
