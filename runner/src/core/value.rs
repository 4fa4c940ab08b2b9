//! Typed representation of runner option values.
//!
//! Options arrive from TOML (host config) or JSON (encoded nested options and
//! config files). Both decode into [`ArgValue`], a tagged variant that keeps
//! table keys in document order so flattening stays deterministic.

use std::fmt;

use anyhow::{Context, Result};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// A single option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<ArgValue>),
    Table(ArgTable),
    /// JSON `null`; skipped wherever it appears.
    Unset,
}

impl ArgValue {
    /// Render a value as a single command-line token.
    ///
    /// Scalars render as their plain text. Lists and tables have no flat
    /// form, so they render as compact JSON.
    pub fn render(&self) -> String {
        match self {
            ArgValue::Bool(b) => b.to_string(),
            ArgValue::Integer(i) => i.to_string(),
            ArgValue::Float(f) => f.to_string(),
            ArgValue::Text(s) => s.clone(),
            ArgValue::Unset => String::new(),
            ArgValue::List(_) | ArgValue::Table(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }

    /// Loose truthiness used by flag-style options.
    pub fn is_truthy(&self) -> bool {
        match self {
            ArgValue::Bool(b) => *b,
            ArgValue::Integer(i) => *i != 0,
            ArgValue::Float(f) => *f != 0.0 && !f.is_nan(),
            ArgValue::Text(s) => is_truthy_text(s),
            ArgValue::List(_) | ArgValue::Table(_) => true,
            ArgValue::Unset => false,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, ArgValue::Unset)
    }
}

/// Truthiness of a textual flag value (`""`, `false` and `0` are false).
pub fn is_truthy_text(s: &str) -> bool {
    !matches!(s.trim(), "" | "false" | "0")
}

/// Ordered key/value table. Insertion order is the source document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgTable(Vec<(String, ArgValue)>);

impl ArgTable {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Decode a JSON object into a table.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("decode json object")
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert or replace `key`, keeping its original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: ArgValue) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, ArgValue)> for ArgTable {
    fn from_iter<I: IntoIterator<Item = (K, ArgValue)>>(iter: I) -> Self {
        let mut table = ArgTable::new();
        for (k, v) in iter {
            table.insert(k, v);
        }
        table
    }
}

impl Serialize for ArgTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ArgTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = ArgTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of option values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ArgTable, A::Error> {
                let mut table = ArgTable::new();
                while let Some((key, value)) = access.next_entry::<String, ArgValue>()? {
                    table.insert(key, value);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// Convenience for building string values in tests and config code.
impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Text(value.to_string())
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Integer(value)
    }
}

impl From<ArgTable> for ArgValue {
    fn from(value: ArgTable) -> Self {
        ArgValue::Table(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_object_keeps_document_order() {
        let table = ArgTable::from_json(r#"{"zeta": 1, "alpha": "a", "mid": true}"#).expect("decode");
        let keys: Vec<&str> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn json_null_decodes_as_unset() {
        let table = ArgTable::from_json(r#"{"gone": null}"#).expect("decode");
        assert_eq!(table.get("gone"), Some(&ArgValue::Unset));
    }

    #[test]
    fn toml_table_decodes_nested_values() {
        let table: ArgTable = toml::from_str(
            "baseUrl = \"http://localhost\"\nspecs = [\"a.js\"]\n[capabilities]\nbrowserName = \"chrome\"\n",
        )
        .expect("decode");
        assert_eq!(table.get("baseUrl"), Some(&ArgValue::from("http://localhost")));
        assert_eq!(
            table.get("specs"),
            Some(&ArgValue::List(vec![ArgValue::from("a.js")]))
        );
        match table.get("capabilities") {
            Some(ArgValue::Table(caps)) => {
                assert_eq!(caps.get("browserName"), Some(&ArgValue::from("chrome")));
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = ArgTable::from_json("{not json").unwrap_err();
        assert!(err.to_string().contains("decode json object"));
    }

    #[test]
    fn render_scalars_and_containers() {
        assert_eq!(ArgValue::Integer(4444).render(), "4444");
        assert_eq!(ArgValue::Float(2.0).render(), "2");
        assert_eq!(ArgValue::Bool(false).render(), "false");
        let table: ArgTable = [("a", ArgValue::Integer(1))].into_iter().collect();
        assert_eq!(ArgValue::Table(table).render(), r#"{"a":1}"#);
    }

    #[test]
    fn truthiness_follows_flag_conventions() {
        assert!(ArgValue::Bool(true).is_truthy());
        assert!(!ArgValue::Text("false".to_string()).is_truthy());
        assert!(!ArgValue::Text(String::new()).is_truthy());
        assert!(ArgValue::Text("yes".to_string()).is_truthy());
        assert!(!ArgValue::Unset.is_truthy());
    }
}
