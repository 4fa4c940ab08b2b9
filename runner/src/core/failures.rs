//! Failed spec extraction from captured runner output.
//!
//! Two report grammars are recognized. A Cucumber summary (`3 scenarios (...)`)
//! lists failing scenarios as `path:line # Scenario: name`. Everything else is
//! treated as a Jasmine/Mocha-style report whose failures show up as stack
//! frames of anonymous spec functions.

use std::sync::LazyLock;

use regex::Regex;

static CUCUMBER_SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\d+ scenarios?").unwrap());

static CUCUMBER_FAILED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*?):\d+ # Scenario:.*").unwrap());

static STACK_FRAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"at (?:\[object Object\]|Object)\.<anonymous> \((([A-Za-z]:\\)?.*?):.*\)")
        .unwrap()
});

/// Frames under this directory belong to the runner and its dependencies.
const DEPENDENCY_DIR_MARKER: &str = "node_modules";

/// Report grammar detected in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Cucumber,
    StackTrace,
}

pub fn detect_format(output: &str) -> ReportFormat {
    if CUCUMBER_SUMMARY_RE.is_match(output) {
        ReportFormat::Cucumber
    } else {
        ReportFormat::StackTrace
    }
}

/// Return the distinct spec paths that failed, in first-seen order.
///
/// Never fails: output without recognizable failures yields an empty list.
pub fn failed_specs(output: Option<&str>) -> Vec<String> {
    let output = output.unwrap_or_default();
    let found: Vec<&str> = match detect_format(output) {
        ReportFormat::Cucumber => CUCUMBER_FAILED_RE
            .captures_iter(output)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .collect(),
        ReportFormat::StackTrace => STACK_FRAME_RE
            .captures_iter(output)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|path| !path.contains(DEPENDENCY_DIR_MARKER))
            .collect(),
    };

    let mut specs: Vec<String> = Vec::new();
    for path in found {
        if !specs.iter().any(|s| s == path) {
            specs.push(path.to_string());
        }
    }
    specs
}
