//! Template variables shared across a run and specialized per instance.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::ExportError;
use crate::procfile::ProcessEntry;

/// Named values available to output templates
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TemplateVariables(Map<String, Value>);

impl TemplateVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style variant of [`TemplateVariables::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Store an environment map under `env`
    pub fn set_env(&mut self, env: &BTreeMap<String, String>) {
        let map: Map<String, Value> = env
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        self.0.insert("env".to_string(), Value::Object(map));
    }

    /// The `env` map as owned strings.
    ///
    /// Fails when `env` is missing or holds anything but string values.
    pub fn env(&self) -> Result<BTreeMap<String, String>, ExportError> {
        let map = self
            .0
            .get("env")
            .and_then(Value::as_object)
            .ok_or_else(|| ExportError::InvalidConfiguration("invalid env map".to_string()))?;

        map.iter()
            .map(|(key, value)| match value {
                Value::String(s) => Ok((key.clone(), s.clone())),
                other => Err(ExportError::InvalidConfiguration(format!(
                    "env value for '{}' must be a string, got {}",
                    key, other
                ))),
            })
            .collect()
    }
}

impl From<Map<String, Value>> for TemplateVariables {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Keys every instance sets itself; an env map cannot override them
pub const INSTANCE_ENV_KEYS: [&str; 2] = ["PORT", "PS"];

/// Variables for one process instance.
///
/// Starts from a copy of `base` so no instance-specific value leaks into the
/// next instance. `PORT` and `PS` are dropped from `env`, since templates emit
/// the instance's own values. `description` keeps a non-empty caller value and
/// otherwise defaults to `"<process_name> process for <app>"`.
pub fn build_variables(
    app: &str,
    entry: &ProcessEntry,
    process_name: &str,
    num: u32,
    port: u32,
    base: &TemplateVariables,
) -> TemplateVariables {
    let mut vars = base.clone();
    vars.insert("app", app);
    vars.insert("command", entry.command.as_str());
    vars.insert("command_args", json!(entry.command_args));
    vars.insert("num", num);
    vars.insert("port", port);
    vars.insert("process_name", process_name);
    vars.insert("process_type", entry.name.as_str());
    vars.insert("ps", format!("{}-{}.{}", app, entry.name, num));

    if let Some(Value::Object(env)) = vars.0.get_mut("env") {
        for key in INSTANCE_ENV_KEYS {
            env.remove(key);
        }
    }

    let has_description = vars
        .get_str("description")
        .is_some_and(|d| !d.is_empty());
    if !has_description {
        vars.insert(
            "description",
            format!("{} process for {}", process_name, app),
        );
    }

    vars
}
