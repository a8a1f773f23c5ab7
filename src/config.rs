//! Settings pulled from the editor's `clue` configuration section.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value as JsonValue;

pub const CONFIG_SECTION: &str = "clue";
pub const DEFAULT_BINARY: &str = "clue";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    path: Option<String>,
    env: BTreeMap<String, JsonValue>,
}

/// An immutable snapshot of the configuration, taken once per reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Path or name of the compiler binary.
    pub binary: String,
    /// Variables merged over the inherited environment of every invocation.
    pub env: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            env: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Builds settings from the raw JSON the client returned for the `clue` section.
    /// Anything unusable falls back to defaults.
    pub fn from_json(value: JsonValue) -> Self {
        if value.is_null() {
            return Self::default();
        }
        let raw = match serde_json::from_value::<RawSettings>(value) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!("Invalid `{CONFIG_SECTION}` configuration, using defaults: {err}");
                return Self::default();
            }
        };

        let binary = raw
            .path
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_BINARY.to_string());
        let env = raw
            .env
            .into_iter()
            .map(|(key, value)| (key, coerce_env_value(value)))
            .collect();

        Self { binary, env }
    }
}

/// Strings are taken verbatim; every other JSON value uses its JSON text.
pub fn coerce_env_value(value: JsonValue) -> String {
    match value {
        JsonValue::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_when_missing() {
        assert_eq!(Settings::from_json(JsonValue::Null), Settings::default());
        assert_eq!(Settings::from_json(json!({})).binary, "clue");
        assert_eq!(Settings::from_json(json!({ "path": "  " })).binary, "clue");
    }

    #[test]
    fn malformed_falls_back_to_defaults() {
        assert_eq!(Settings::from_json(json!({ "path": 5 })), Settings::default());
    }

    #[test]
    fn env_values_are_coerced() {
        let settings = Settings::from_json(json!({
            "path": "/opt/clue/bin/clue",
            "env": { "NAME": "demo", "DEBUG": true, "LEVEL": 3, "LIST": [1, "a"], "NOTHING": null }
        }));
        assert_eq!(settings.binary, "/opt/clue/bin/clue");
        assert_eq!(settings.env["NAME"], "demo");
        assert_eq!(settings.env["DEBUG"], "true");
        assert_eq!(settings.env["LEVEL"], "3");
        assert_eq!(settings.env["LIST"], r#"[1,"a"]"#);
        assert_eq!(settings.env["NOTHING"], "null");
    }
}
