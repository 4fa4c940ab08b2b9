//! Spec list merging and path remapping.

use std::path::Path;

use crate::core::args::ArgOverrides;
use crate::core::value::{ArgTable, ArgValue};

/// Prefix of spec paths declared in the runner config file.
pub const CONFIG_SPEC_PREFIX: &str = "../..";
/// Replacement for [`CONFIG_SPEC_PREFIX`].
pub const CONFIG_SPEC_STAGING: &str = ".tmp/e2e";
/// Project directory holding test sources, relative to the project root.
pub const TEST_SOURCE_DIR: &str = "test";
/// Staging directory that failed specs are rerun from.
pub const FAILED_SPEC_STAGING: &str = ".tmp";

/// Explicitly selected specs: the `specs` override (comma-separated) if set,
/// otherwise the configured `specs` option.
pub fn explicit_specs(options: &ArgTable, overrides: &ArgOverrides) -> Vec<String> {
    if let Some(raw) = overrides.get("specs") {
        return split_list(raw);
    }
    match options.get("specs") {
        Some(ArgValue::List(items)) => items
            .iter()
            .filter(|v| !v.is_unset())
            .map(ArgValue::render)
            .collect(),
        Some(ArgValue::Text(raw)) => split_list(raw),
        _ => Vec::new(),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(|s| s.trim().to_string()).collect()
}

/// Map a config-file spec into the staging tree.
pub fn stage_config_spec(spec: &str) -> String {
    spec.replacen(CONFIG_SPEC_PREFIX, CONFIG_SPEC_STAGING, 1)
}

/// Map a failed spec path reported by the runner onto its staged copy.
pub fn remap_failed_spec(spec: &str, project_root: &Path) -> String {
    let source_dir = project_root.join(TEST_SOURCE_DIR);
    spec.replacen(
        source_dir.to_string_lossy().as_ref(),
        FAILED_SPEC_STAGING,
        1,
    )
}

/// Ordered union of `explicit` and `from_config_file`.
///
/// Explicit specs come first; empty entries and duplicates are dropped.
pub fn merge_specs(explicit: &[String], from_config_file: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for spec in explicit.iter().chain(from_config_file) {
        if spec.is_empty() || merged.contains(spec) {
            continue;
        }
        merged.push(spec.clone());
    }
    merged
}
