//! Translation of runner options into the test runner's command line.
//!
//! The runner accepts four option families, each rendered differently:
//!
//! - simple strings: `--key value`
//! - lists: `--key a,b,c` (one comma-joined token)
//! - booleans: bare `--key` when truthy, omitted otherwise
//! - nested objects: flattened into dotted paths, `--key.sub.leaf value`
//!
//! Families are emitted in a fixed order, and keys within a family follow the
//! declared lists below, so the output never depends on map iteration order.

use anyhow::{Context, Result};

use crate::core::value::{ArgTable, ArgValue, is_truthy_text};

pub const STRING_KEYS: &[&str] = &[
    "seleniumAddress",
    "seleniumServerJar",
    "seleniumPort",
    "baseUrl",
    "rootElement",
    "browser",
    "chromeDriver",
    "chromeOnly",
    "directConnect",
    "sauceUser",
    "sauceKey",
    "sauceSeleniumAddress",
    "framework",
    "frameworkPath",
    "suite",
    "beforeLaunch",
    "onPrepare",
    "webDriverProxy",
];

pub const LIST_KEYS: &[&str] = &["specs", "exclude"];

pub const BOOL_KEYS: &[&str] = &["includeStackTrace", "verbose"];

pub const OBJECT_KEYS: &[&str] = &["params", "capabilities", "cucumberOpts", "mochaOpts"];

/// Token added when color output is disabled.
pub const NO_COLOR_TOKEN: &str = "--no-jasmineNodeOpts.showColors";

/// Interpreter token that enables debug mode.
pub const DEBUG_TOKEN: &str = "debug";

/// Option values supplied by an external source (e.g. `--set key=value`).
///
/// An override wins over the configured value of the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgOverrides(Vec<(String, String)>);

impl ArgOverrides {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Set `key`, replacing any earlier value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ArgOverrides {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut overrides = ArgOverrides::new();
        for (k, v) in iter {
            overrides.set(k, v);
        }
        overrides
    }
}

/// Launch-level settings that shape the token list around the options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    /// Interpreter binary that runs the entrypoint (e.g. `node`).
    pub interpreter: String,
    /// Flags passed to the interpreter before the entrypoint.
    pub interpreter_flags: Vec<String>,
    /// Test runner script.
    pub entrypoint: String,
    /// Runner config file, passed positionally after the entrypoint.
    pub config_file: Option<String>,
    pub no_color: bool,
    pub debug: bool,
}

/// A fully built child process command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Value following the first `flag` token, if any.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.args.iter().any(|a| a == token)
    }
}

/// Build the invocation for one attempt.
///
/// `specs` is the attempt's spec selection and always replaces whatever
/// `specs` value the options or overrides carry.
pub fn build_invocation(
    launch: &LaunchSettings,
    options: &ArgTable,
    overrides: &ArgOverrides,
    specs: &[String],
) -> Result<Invocation> {
    let mut args = Vec::new();
    if launch.debug {
        args.push(DEBUG_TOKEN.to_string());
    }
    args.extend(launch.interpreter_flags.iter().cloned());
    args.push(launch.entrypoint.clone());
    if let Some(config_file) = &launch.config_file {
        args.push(config_file.clone());
    }
    if launch.no_color {
        args.push(NO_COLOR_TOKEN.to_string());
    }
    args.extend(translate_options(options, overrides, specs)?);

    Ok(Invocation {
        program: launch.interpreter.clone(),
        args,
    })
}

/// Translate options into runner flags (everything after the positional args).
pub fn translate_options(
    options: &ArgTable,
    overrides: &ArgOverrides,
    specs: &[String],
) -> Result<Vec<String>> {
    let mut tokens = Vec::new();

    for key in STRING_KEYS {
        let value = match overrides.get(key) {
            Some(v) => Some(v.to_string()),
            None => options.get(key).filter(|v| !v.is_unset()).map(ArgValue::render),
        };
        if let Some(value) = value {
            tokens.push(format!("--{key}"));
            tokens.push(value);
        }
    }

    for key in LIST_KEYS {
        let value = if *key == "specs" {
            Some(specs.join(","))
        } else {
            match overrides.get(key) {
                Some(v) => Some(v.to_string()),
                None => options.get(key).and_then(join_list),
            }
        };
        if let Some(value) = value {
            tokens.push(format!("--{key}"));
            tokens.push(value);
        }
    }

    for key in BOOL_KEYS {
        let truthy = match overrides.get(key) {
            Some(v) => is_truthy_text(v),
            None => options.get(key).is_some_and(ArgValue::is_truthy),
        };
        if truthy {
            tokens.push(format!("--{key}"));
        }
    }

    for key in OBJECT_KEYS {
        let table = match overrides.get(key) {
            Some(raw) => Some(
                ArgTable::from_json(raw).with_context(|| format!("decode `{key}` override"))?,
            ),
            None => match options.get(key) {
                Some(ArgValue::Table(table)) => Some(table.clone()),
                Some(ArgValue::Text(raw)) => Some(
                    ArgTable::from_json(raw).with_context(|| format!("decode `{key}` option"))?,
                ),
                _ => None,
            },
        };
        if let Some(table) = table {
            flatten_object(&format!("--{key}"), &table, &mut tokens);
        }
    }

    Ok(tokens)
}

fn join_list(value: &ArgValue) -> Option<String> {
    match value {
        ArgValue::Unset => None,
        ArgValue::List(items) => Some(
            items
                .iter()
                .filter(|v| !v.is_unset())
                .map(ArgValue::render)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.render()),
    }
}

/// Flatten `table` under `prefix` (which carries its leading `--`).
///
/// Arrays repeat the flag once per element, unlike top-level list options.
/// `false` renders in negated form: `--capabilities` + `off` becomes
/// `--no-capabilities.off`.
pub fn flatten_object(prefix: &str, table: &ArgTable, tokens: &mut Vec<String>) {
    for (key, value) in table.iter() {
        let path = format!("{prefix}.{key}");
        match value {
            ArgValue::List(items) => {
                for item in items.iter().filter(|v| !v.is_unset()) {
                    tokens.push(path.clone());
                    tokens.push(item.render());
                }
            }
            ArgValue::Table(inner) => flatten_object(&path, inner, tokens),
            ArgValue::Unset => {}
            ArgValue::Bool(true) => tokens.push(path),
            ArgValue::Bool(false) => {
                tokens.push(format!("--no{}.{key}", &prefix[1..]));
            }
            scalar => {
                tokens.push(path);
                tokens.push(scalar.render());
            }
        }
    }
}
