//! Recursive configuration value

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::HashMap;

/// A value obtained from any configuration source.
///
/// Scalars cover everything a JSON document can hold at a leaf; composite
/// values are ordered sequences or string-keyed mappings whose key order is
/// irrelevant. The serialized form is plain JSON.
///
/// `Debug` output shows the shape of a value but never its string or number
/// scalars, since any of them may be a secret.
#[derive(Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ConfigValue {
    /// Explicit null, or a value that carries nothing
    #[default]
    Null,
    /// Boolean scalar
    Bool(bool),
    /// Numeric scalar, keeping the digits exactly as written in the source
    Number(Number),
    /// String scalar, including opaque payloads that failed to decode
    String(String),
    /// Ordered sequence
    Sequence(Vec<ConfigValue>),
    /// Mapping from key to value
    Mapping(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Decode a raw payload, falling back to an opaque string scalar.
    ///
    /// Decoding failure is not an error: plain strings such as `bar` or
    /// `postgres://db` come back as [`ConfigValue::String`] unchanged.
    /// Numbers keep their source text, so `1.10` renders back as `1.10`.
    #[must_use]
    pub fn decode(raw: &str) -> Self {
        serde_json::from_str::<Value>(raw).map_or_else(|_| Self::String(raw.to_owned()), Self::from)
    }

    /// Decode a raw payload only when it is a JSON object or array.
    ///
    /// Returns `None` for anything else, including strings that would decode
    /// to a JSON scalar (`"42"`, `"true"`).
    #[must_use]
    pub fn decode_document(raw: &str) -> Option<Self> {
        let trimmed = raw.trim_start();
        if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
            return None;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value.into()),
            _ => None,
        }
    }

    /// Whether this value counts as missing for lookup purposes.
    ///
    /// Only `Null` and the empty string are absent. `false`, `0` and empty
    /// composites are present values.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Borrow the string scalar, if this is one
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Borrow the boolean scalar, if this is one
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow the sequence, if this is one
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Self]> {
        match self {
            Self::Sequence(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Borrow the mapping, if this is one
    #[must_use]
    pub fn as_mapping(&self) -> Option<&HashMap<String, Self>> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key in a mapping value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// Render as compact JSON text
    #[must_use]
    pub fn to_json(&self) -> String {
        Value::from(self.clone()).to_string()
    }
}

const REDACTED: &str = "[REDACTED]";

impl std::fmt::Debug for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Number(_) => f.debug_tuple("Number").field(&format_args!("{REDACTED}")).finish(),
            Self::String(_) => f.debug_tuple("String").field(&format_args!("{REDACTED}")).finish(),
            Self::Sequence(items) => f.debug_list().entries(items).finish(),
            Self::Mapping(map) => f.debug_map().entries(map).finish(),
        }
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Mapping(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<ConfigValue> for Value {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Null => Self::Null,
            ConfigValue::Bool(b) => Self::Bool(b),
            ConfigValue::Number(n) => Self::Number(n),
            ConfigValue::String(s) => Self::String(s),
            ConfigValue::Sequence(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            ConfigValue::Mapping(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(items: Vec<Self>) -> Self {
        Self::Sequence(items)
    }
}

impl From<HashMap<String, ConfigValue>> for ConfigValue {
    fn from(map: HashMap<String, Self>) -> Self {
        Self::Mapping(map)
    }
}
