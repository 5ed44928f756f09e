//! Generic attribute values
//!
//! A [`Value`] is the untyped representation shared by declared
//! configuration, resource state and packed payloads. Nested blocks are
//! lists of maps, matching how the declarative tool models them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Ordered attribute map, keyed by snake_case attribute name
pub type Attributes = BTreeMap<String, Value>;

/// An attribute value
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent / unknown
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    /// Ordered list
    List(Vec<Value>),
    /// Unordered set; never holds duplicates
    Set(BTreeSet<Value>),
    /// Nested object (an element of a block list)
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Build a single-element block list from an attribute map
    pub fn block(attributes: Attributes) -> Self {
        Self::List(vec![Self::Map(attributes)])
    }

    /// Build a set of strings
    pub fn string_set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Set(items.into_iter().map(|s| Self::String(s.into())).collect())
    }

    /// Build a list of strings
    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::String(s.into())).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this is the zero value of its type.
    ///
    /// Zero values are treated as "not set" by [`crate::ResourceData::get_ok`].
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Int(i) => *i == 0,
            Self::String(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Set(items) => items.is_empty(),
            Self::Map(map) => map.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Elements of a list or set, in iteration order
    pub fn elements(&self) -> Vec<&Value> {
        match self {
            Self::List(items) => items.iter().collect(),
            Self::Set(items) => items.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// String elements of a list or set; non-strings are skipped
    pub fn strings(&self) -> Vec<String> {
        self.elements()
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    /// Maps held by a block list (or a bare map)
    pub fn blocks(&self) -> Vec<&Attributes> {
        match self {
            Self::Map(map) => vec![map],
            _ => self
                .elements()
                .into_iter()
                .filter_map(|v| match v {
                    Self::Map(map) => Some(map),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Short name of the value's kind, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
        }
    }

    /// Convert to JSON for display and persistence
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::String(s) => write!(f, "{s:?}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<Attributes> for Value {
    fn from(map: Attributes) -> Self {
        Self::Map(map)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n.as_i64().map_or(Self::Null, Self::Int),
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Into::into).collect()),
            serde_json::Value::Object(map) => {
                Self::Map(map.iter().map(|(k, v)| (k.clone(), v.into())).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_values() {
        assert!(Value::Null.is_zero());
        assert!(Value::from("").is_zero());
        assert!(Value::from(false).is_zero());
        assert!(Value::from(0_i64).is_zero());
        assert!(Value::List(vec![]).is_zero());
        assert!(!Value::from("x").is_zero());
        assert!(!Value::from(true).is_zero());
    }

    #[test]
    fn test_set_is_unordered() {
        let a = Value::string_set(["b", "a", "a"]);
        let b = Value::string_set(["a", "b"]);
        assert_eq!(a, b);
        assert_eq!(a.strings(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_block_helpers() {
        let mut attrs = Attributes::new();
        attrs.insert("enabled".into(), true.into());
        let block = Value::block(attrs.clone());
        assert_eq!(block.blocks(), vec![&attrs]);
    }

    #[test]
    fn test_json_round_trip_shape() {
        let json = serde_json::json!({"a": [1, "x"], "b": null, "c": true});
        let value = Value::from(&json);
        assert_eq!(value.to_json(), json);
    }
}
