//! Retrying end-to-end test runner driver.
//!
//! Reads `e2e-runner.toml`, translates it into the test runner's command line
//! and runs it. With `keep_alive`, failed specs are rerun (three attempts in
//! total) and the process exits with the last run's exit code.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use e2e_runner::core::args::ArgOverrides;
use e2e_runner::exit_codes;
use e2e_runner::io::config::{DEFAULT_CONFIG_PATH, RunnerConfig, load_config};
use e2e_runner::io::driver::update_driver;
use e2e_runner::io::process::ProcessLauncher;
use e2e_runner::logging;
use e2e_runner::session::{SessionEvent, SessionOutcome, SessionPlan, SessionReport, run_session};

#[derive(Parser)]
#[command(
    name = "e2e-runner",
    version,
    about = "Run end-to-end tests and retry failed specs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Runner config (TOML).
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Override a runner option, e.g. `--set baseUrl=http://localhost:9000`.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_override)]
    overrides: Vec<(String, String)>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the tests, rerunning failed specs when keep-alive is on.
    Run {
        #[command(flatten)]
        config: ConfigArgs,
        /// Retry failed specs instead of failing on the first non-zero exit.
        #[arg(long)]
        keep_alive: bool,
        /// Disable colored reporter output.
        #[arg(long)]
        no_color: bool,
        /// Start the interpreter in debug mode.
        #[arg(long)]
        debug: bool,
    },
    /// Print the first attempt's command line, one token per line.
    Args {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = std::env::current_dir().context("resolve current directory")?;
    match cli.command {
        Command::Run {
            config,
            keep_alive,
            no_color,
            debug,
        } => {
            let mut cfg = load(&root, &config)?;
            cfg.keep_alive |= keep_alive;
            cfg.no_color |= no_color;
            cfg.debug |= debug;
            cmd_run(&root, &cfg, overrides(&config))
        }
        Command::Args { config } => {
            let cfg = load(&root, &config)?;
            cmd_args(&root, &cfg, overrides(&config))?;
            Ok(exit_codes::OK)
        }
    }
}

fn load(root: &Path, args: &ConfigArgs) -> Result<RunnerConfig> {
    let path = root.join(&args.config);
    load_config(&path).with_context(|| format!("load config {}", path.display()))
}

fn overrides(args: &ConfigArgs) -> ArgOverrides {
    args.overrides.iter().cloned().collect()
}

fn parse_override(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

fn cmd_run(root: &Path, cfg: &RunnerConfig, overrides: ArgOverrides) -> Result<i32> {
    let plan = SessionPlan::from_config(cfg, overrides, root)?;
    println!("e2e-runner: specs: {}", plan.initial_specs.join(", "));
    if let Some(target) = &plan.output {
        println!("e2e-runner: writing output to {}", target.path.display());
    }
    if cfg.pre_update_driver {
        update_driver(cfg)?;
    }

    let report = run_session(&ProcessLauncher::new(), plan, print_event)?;
    print_summary(&report);
    Ok(report.exit_code())
}

fn cmd_args(root: &Path, cfg: &RunnerConfig, overrides: ArgOverrides) -> Result<()> {
    let plan = SessionPlan::from_config(cfg, overrides, root)?;
    let invocation = plan.invocation(&plan.initial_specs)?;
    println!("{}", invocation.program);
    for arg in &invocation.args {
        println!("{arg}");
    }
    Ok(())
}

fn print_event(event: &SessionEvent<'_>) {
    match event {
        SessionEvent::AttemptStarted { number, .. } if *number > 1 => {
            println!("e2e-runner: re-running tests, attempt {number}");
        }
        SessionEvent::Retrying { specs, .. } => {
            println!("e2e-runner: tests failed, keeping alive and retrying failed specs:");
            for spec in *specs {
                println!("  {spec}");
            }
        }
        _ => {}
    }
}

fn print_summary(report: &SessionReport) {
    let attempts = report.attempts.len();
    match &report.outcome {
        SessionOutcome::Passed => {
            println!("e2e-runner: tests passed after {attempts} attempt(s)");
        }
        SessionOutcome::Failed { exit_code, gave_up } => {
            let reason = if *gave_up {
                "retries exhausted"
            } else {
                "keep-alive off"
            };
            eprintln!(
                "e2e-runner: tests failed ({reason}), runner exited with code {exit_code} after {attempts} attempt(s)"
            );
        }
    }
    for (number, specs) in report.reruns() {
        println!("e2e-runner: attempt {number} reran: {}", specs.join(", "));
    }
}
