//! Runner configuration stored in `e2e-runner.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::args::LaunchSettings;
use crate::core::value::ArgTable;

/// Default config path, relative to the project root.
pub const DEFAULT_CONFIG_PATH: &str = "e2e-runner.toml";

/// Runner configuration (TOML).
///
/// Missing fields default to driving a locally installed Protractor with
/// `node`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Rerun failed specs instead of failing on the first non-zero exit.
    pub keep_alive: bool,

    /// Disable colored reporter output.
    pub no_color: bool,

    /// Start the interpreter in debug mode.
    pub debug: bool,

    /// Interpreter binary that runs the entrypoint.
    pub interpreter: String,

    /// Flags passed verbatim to the interpreter.
    pub interpreter_flags: Vec<String>,

    /// Test runner script.
    pub entrypoint: String,

    /// Driver manager script used by `pre_update_driver`.
    pub driver_manager: String,

    /// Run `<driver_manager> update` before the first attempt.
    pub pre_update_driver: bool,

    /// Runner config file; its `specs` are merged into the run.
    pub config_file: Option<String>,

    /// Persist filtered stdout here.
    pub output: Option<PathBuf>,

    pub output_settings: OutputSettings,

    /// Runner options translated into command-line flags.
    pub args: ArgTable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputSettings {
    /// Append to the output file instead of truncating it per attempt.
    pub append: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            keep_alive: false,
            no_color: false,
            debug: false,
            interpreter: "node".to_string(),
            interpreter_flags: Vec::new(),
            entrypoint: "node_modules/protractor/bin/protractor".to_string(),
            driver_manager: "node_modules/protractor/bin/webdriver-manager".to_string(),
            pre_update_driver: false,
            config_file: None,
            output: None,
            output_settings: OutputSettings::default(),
            args: ArgTable::new(),
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interpreter.trim().is_empty() {
            return Err(anyhow!("interpreter must be non-empty"));
        }
        if self.entrypoint.trim().is_empty() {
            return Err(anyhow!("entrypoint must be non-empty"));
        }
        if self.pre_update_driver && self.driver_manager.trim().is_empty() {
            return Err(anyhow!(
                "driver_manager must be non-empty when pre_update_driver is set"
            ));
        }
        if let Some(config_file) = &self.config_file
            && config_file.trim().is_empty()
        {
            return Err(anyhow!("config_file must not be empty"));
        }
        Ok(())
    }

    pub fn launch_settings(&self) -> LaunchSettings {
        LaunchSettings {
            interpreter: self.interpreter.clone(),
            interpreter_flags: self.interpreter_flags.clone(),
            entrypoint: self.entrypoint.clone(),
            config_file: self.config_file.clone(),
            no_color: self.no_color,
            debug: self.debug,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RunnerConfig::default()`.
pub fn load_config(path: &Path) -> Result<RunnerConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = RunnerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunnerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[derive(Debug, Default, Deserialize)]
struct RunnerConfigFile {
    #[serde(default)]
    specs: Vec<String>,
}

/// Prints the `specs` of a CommonJS runner config (`exports.config = {...}`)
/// as a JSON array on the last line of stdout.
const JS_SPECS_SCRIPT: &str = "const m = require(require('path').resolve(process.argv[1])); \
const c = (m && m.config) || m || {}; \
console.log(JSON.stringify(Array.isArray(c.specs) ? c.specs : []));";

/// Read the `specs` declared in the test runner's own config file.
///
/// `.js` and `.cjs` modules are evaluated with `interpreter`; `.json` files
/// are parsed as JSON, anything else as TOML. A file without a `specs` field
/// declares no specs.
pub fn load_config_file_specs(path: &Path, interpreter: &str) -> Result<Vec<String>> {
    let specs = match path.extension().and_then(|ext| ext.to_str()) {
        Some("js" | "cjs") => load_js_specs(path, interpreter)?,
        ext => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("read runner config file {}", path.display()))?;
            let file: RunnerConfigFile = if ext == Some("json") {
                serde_json::from_str(&contents)
                    .with_context(|| format!("parse runner config file {}", path.display()))?
            } else {
                toml::from_str(&contents)
                    .with_context(|| format!("parse runner config file {}", path.display()))?
            };
            file.specs
        }
    };
    debug!(path = %path.display(), specs = specs.len(), "loaded config file specs");
    Ok(specs)
}

fn load_js_specs(path: &Path, interpreter: &str) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(anyhow!("read runner config file {}: not found", path.display()));
    }
    let output = Command::new(interpreter)
        .arg("-e")
        .arg(JS_SPECS_SCRIPT)
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("spawn {interpreter} to evaluate {}", path.display()))?;
    if !output.status.success() {
        return Err(anyhow!(
            "evaluate runner config file {} (exit {:?}): {}",
            path.display(),
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    // Config modules may log while loading; the specs are on the last line.
    let stdout = String::from_utf8_lossy(&output.stdout);
    let last = stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("[]");
    serde_json::from_str(last)
        .with_context(|| format!("parse specs of runner config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::ArgValue;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RunnerConfig::default());
    }

    #[test]
    fn load_parses_flags_and_args() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("e2e-runner.toml");
        fs::write(
            &path,
            r#"
keep_alive = true
no_color = true
interpreter_flags = ["--harmony"]
config_file = "test/protractor.conf.json"
output = "reports/e2e.txt"

[output_settings]
append = true

[args]
baseUrl = "http://localhost:9000"
specs = ["test/a.js"]

[args.capabilities]
browserName = "chrome"
"#,
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert!(cfg.keep_alive);
        assert!(cfg.no_color);
        assert!(!cfg.debug);
        assert_eq!(cfg.interpreter, "node");
        assert_eq!(cfg.interpreter_flags, vec!["--harmony"]);
        assert_eq!(cfg.output, Some(PathBuf::from("reports/e2e.txt")));
        assert!(cfg.output_settings.append);
        assert_eq!(
            cfg.args.get("baseUrl"),
            Some(&ArgValue::from("http://localhost:9000"))
        );
        assert!(matches!(cfg.args.get("capabilities"), Some(ArgValue::Table(_))));
        assert_eq!(
            cfg.launch_settings().config_file.as_deref(),
            Some("test/protractor.conf.json")
        );
    }

    #[test]
    fn validate_rejects_empty_interpreter() {
        let cfg = RunnerConfig {
            interpreter: " ".to_string(),
            ..RunnerConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("interpreter"));
    }

    #[test]
    fn config_file_specs_from_json_and_toml() {
        let temp = tempfile::tempdir().expect("tempdir");
        let json = temp.path().join("protractor.conf.json");
        fs::write(&json, r#"{"framework": "jasmine", "specs": ["../../test/a.js"]}"#)
            .expect("write json");
        assert_eq!(
            load_config_file_specs(&json, "node").expect("json"),
            vec!["../../test/a.js"]
        );

        let toml_path = temp.path().join("protractor.toml");
        fs::write(&toml_path, "specs = [\"b.js\", \"c.js\"]\n").expect("write toml");
        assert_eq!(
            load_config_file_specs(&toml_path, "node").expect("toml"),
            vec!["b.js", "c.js"]
        );

        let bare = temp.path().join("bare.json");
        fs::write(&bare, "{}").expect("write bare");
        assert!(load_config_file_specs(&bare, "node").expect("bare").is_empty());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_config_file_specs(&temp.path().join("nope.json"), "node").unwrap_err();
        assert!(err.to_string().contains("read runner config file"));
    }
    /// Fake interpreter that answers the specs query like node would for
    /// `exports.config = { specs: [...] }`.
    #[cfg(unix)]
    fn fake_interpreter(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-node");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write interpreter");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("chmod");
        path
    }

    #[cfg(unix)]
    #[test]
    fn js_config_file_specs_come_from_the_interpreter() {
        let temp = tempfile::tempdir().expect("tempdir");
        let conf = temp.path().join("protractor.conf.js");
        fs::write(&conf, "exports.config = { specs: ['../../test/a.js'] };\n").expect("write js");
        let interpreter = fake_interpreter(
            temp.path(),
            r#"[ "$1" = "-e" ] || exit 9
[ -f "$3" ] || exit 8
echo "loading config"
echo '["../../test/a.js","../../test/b.js"]'"#,
        );

        let specs = load_config_file_specs(&conf, interpreter.to_str().expect("utf8 path"))
            .expect("js specs");
        assert_eq!(specs, vec!["../../test/a.js", "../../test/b.js"]);
    }

    #[cfg(unix)]
    #[test]
    fn js_config_file_that_fails_to_load_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let conf = temp.path().join("protractor.conf.js");
        fs::write(&conf, "throw new Error('boom');\n").expect("write js");
        let interpreter = fake_interpreter(temp.path(), "echo 'Error: boom' >&2\nexit 1");

        let err = load_config_file_specs(&conf, interpreter.to_str().expect("utf8 path"))
            .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("evaluate runner config file"), "{msg}");
        assert!(msg.contains("boom"), "{msg}");
    }

    #[test]
    fn missing_js_config_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_config_file_specs(&temp.path().join("nope.conf.js"), "node").unwrap_err();
        assert!(err.to_string().contains("read runner config file"));
    }
}
