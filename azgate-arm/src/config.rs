//! Resource configuration: field schema and the key/value accessor handlers read from.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required field '{0}'")]
    Missing(String),

    #[error("field '{key}' must be {expected}")]
    WrongType { key: String, expected: FieldKind },

    #[error("unknown field '{0}'")]
    Unknown(String),

    #[error("field '{key}' {reason}")]
    Invalid { key: String, reason: String },
}

type Result<T> = std::result::Result<T, ConfigError>;

/// Value type of a configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Bool,
    Int,
    /// Array of strings; order and duplicates are ignored.
    StringSet,
    /// Object with string values.
    StringMap,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::Int => value.is_i64(),
            Self::StringSet => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            Self::StringMap => value
                .as_object()
                .is_some_and(|map| map.values().all(Value::is_string)),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::String => "a string",
            Self::Bool => "a boolean",
            Self::Int => "an integer",
            Self::StringSet => "a list of strings",
            Self::StringMap => "a map of strings",
        };
        f.write_str(s)
    }
}

/// Schema entry for one configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Changing the value means replacing the resource.
    pub force_new: bool,
    /// Filled in from the remote resource, never by the user.
    pub computed: bool,
}

impl FieldSchema {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            force_new: false,
            computed: false,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            force_new: false,
            computed: false,
        }
    }

    pub const fn computed(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            force_new: false,
            computed: true,
        }
    }

    pub const fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }
}

/// Configuration and state of one resource: its ID plus field values.
///
/// Serialized as a flat JSON object with an optional `id` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(flatten)]
    values: Map<String, Value>,
}

impl ResourceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Map<String, Value>) -> Self {
        Self { id: None, values }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Forget the remote resource (it no longer exists).
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Raw value; JSON `null` counts as absent.
    fn raw(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    fn present(&self, key: &str) -> Result<&Value> {
        self.raw(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn wrong_type(key: &str, expected: FieldKind) -> ConfigError {
        ConfigError::WrongType {
            key: key.to_string(),
            expected,
        }
    }

    pub fn get_str(&self, key: &str) -> Result<&str> {
        self.present(key)?
            .as_str()
            .ok_or_else(|| Self::wrong_type(key, FieldKind::String))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.present(key)?
            .as_bool()
            .ok_or_else(|| Self::wrong_type(key, FieldKind::Bool))
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.present(key)?
            .as_i64()
            .ok_or_else(|| Self::wrong_type(key, FieldKind::Int))
    }

    /// Sorted, deduplicated set of strings.
    pub fn get_set(&self, key: &str) -> Result<Vec<String>> {
        let items = self
            .present(key)?
            .as_array()
            .ok_or_else(|| Self::wrong_type(key, FieldKind::StringSet))?;
        let set = items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<BTreeSet<_>>>()
            .ok_or_else(|| Self::wrong_type(key, FieldKind::StringSet))?;
        Ok(set.into_iter().collect())
    }

    pub fn get_map(&self, key: &str) -> Result<BTreeMap<String, String>> {
        self.present(key)?
            .as_object()
            .ok_or_else(|| Self::wrong_type(key, FieldKind::StringMap))?
            .iter()
            .map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect::<Option<BTreeMap<_, _>>>()
            .ok_or_else(|| Self::wrong_type(key, FieldKind::StringMap))
    }

    /// `None` when absent or empty.
    pub fn get_ok_str(&self, key: &str) -> Result<Option<&str>> {
        match self.raw(key) {
            None => Ok(None),
            Some(_) => self.get_str(key).map(|s| (!s.is_empty()).then_some(s)),
        }
    }

    /// `None` when absent.
    pub fn get_ok_int(&self, key: &str) -> Result<Option<i64>> {
        match self.raw(key) {
            None => Ok(None),
            Some(_) => self.get_int(key).map(Some),
        }
    }

    /// `None` when absent or empty.
    pub fn get_ok_set(&self, key: &str) -> Result<Option<Vec<String>>> {
        match self.raw(key) {
            None => Ok(None),
            Some(_) => self
                .get_set(key)
                .map(|set| (!set.is_empty()).then_some(set)),
        }
    }

    /// `None` when absent or empty.
    pub fn get_ok_map(&self, key: &str) -> Result<Option<BTreeMap<String, String>>> {
        match self.raw(key) {
            None => Ok(None),
            Some(_) => self
                .get_map(key)
                .map(|map| (!map.is_empty()).then_some(map)),
        }
    }

    /// Check values against `schema`: no unknown keys, correct kinds, and
    /// every required field present.
    pub fn validate(&self, schema: &[FieldSchema]) -> Result<()> {
        for (key, value) in &self.values {
            let field = schema
                .iter()
                .find(|f| f.name == key)
                .ok_or_else(|| ConfigError::Unknown(key.clone()))?;
            if !value.is_null() && !field.kind.matches(value) {
                return Err(Self::wrong_type(key, field.kind));
            }
        }

        for field in schema.iter().filter(|f| f.required && !f.computed) {
            if self.raw(field.name).is_none() {
                return Err(ConfigError::Missing(field.name.to_string()));
            }
        }

        Ok(())
    }
}

/// Convert a string map into a JSON object value.
pub fn map_value(map: &BTreeMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}
