//! Resource attribute bag
//!
//! [`ResourceData`] holds one resource instance while an operation runs:
//! the last-known state, the working attributes (declared configuration
//! merged with computed state and defaults) and the instance id.
//!
//! Reads go through the typed getters below. Each takes an
//! `only_if_changed` flag: when set and the attribute has not changed
//! relative to the last-known state, the getter returns the type's zero
//! value (or `None`) instead of the current value. Update payloads use this
//! to omit fields the server would otherwise see re-sent as defaults.
//!
//! Writes go through [`ResourceData::set`] or a [`Lens`], which collects
//! failures so that one pack reports every bad key at once.

use crate::error::{Error, Result};
use crate::schema::{Attribute, Schema, ValueType};
use crate::value::{Attributes, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// One resource instance during an operation
#[derive(Debug, Clone)]
pub struct ResourceData {
    id: String,
    schema: Arc<Schema>,
    prior: Attributes,
    current: Attributes,
    /// Keys whose current value came from configuration or a write, not
    /// from stored state, and so has not been through its state function
    raw: BTreeSet<String>,
}

impl ResourceData {
    /// Working data for a declared instance.
    ///
    /// `prior` is the last-known state (empty when the instance is new).
    /// Computed attributes the configuration leaves unset keep their prior
    /// value; remaining gaps are filled from schema defaults.
    pub fn new(
        schema: Arc<Schema>,
        id: impl Into<String>,
        prior: Attributes,
        config: Attributes,
    ) -> Self {
        let prior = schema.coerce(prior);
        let mut current = schema.coerce(config);
        let mut raw: BTreeSet<String> = current
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, _)| k.clone())
            .collect();
        for (name, attr) in schema.iter() {
            if !attr.computed || current.get(name).is_some_and(|v| !v.is_null()) {
                continue;
            }
            if let Some(value) = prior.get(name) {
                current.insert(name.clone(), value.clone());
            }
        }
        for (name, attr) in schema.iter() {
            if attr.default.is_some() && current.get(name).is_none_or(Value::is_null) {
                raw.insert(name.clone());
            }
        }
        schema.apply_defaults(&mut current);

        Self {
            id: id.into(),
            schema,
            prior,
            current,
            raw,
        }
    }

    /// Data reconstructed from stored state only (refresh, delete)
    pub fn from_state(schema: Arc<Schema>, id: impl Into<String>, state: Attributes) -> Self {
        let state = schema.coerce(state);
        Self {
            id: id.into(),
            schema,
            prior: state.clone(),
            current: state,
            raw: BTreeSet::new(),
        }
    }

    /// Data for an import: only the id is known
    pub fn import(schema: Arc<Schema>, id: impl Into<String>) -> Self {
        Self::from_state(schema, id, Attributes::new())
    }

    /// Data for one element of a nested block; every attribute counts as changed
    pub fn nested(schema: Arc<Schema>, attributes: Attributes) -> Self {
        let current = schema.coerce(attributes);
        let raw = current.keys().cloned().collect();
        Self {
            id: String::new(),
            schema,
            prior: Attributes::new(),
            current,
            raw,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Instance id; empty when the instance is absent
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Mark the instance as absent
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    pub fn is_absent(&self) -> bool {
        self.id.is_empty()
    }

    /// Raw value of an attribute (`Null` when unset)
    pub fn get(&self, key: &str) -> &Value {
        self.current.get(key).unwrap_or(&Value::Null)
    }

    /// Value if set to something other than its type's zero value
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.current.get(key).filter(|v| !v.is_zero())
    }

    /// Value if set at all, zero values included
    pub fn get_ok_exists(&self, key: &str) -> Option<&Value> {
        self.current.get(key).filter(|v| !v.is_null())
    }

    /// Whether the attribute differs from the last-known state
    pub fn has_change(&self, key: &str) -> bool {
        let old = self.prior.get(key).unwrap_or(&Value::Null);
        !same_value(old, &self.state_value(key, self.get(key)))
    }

    fn wanted(&self, key: &str, only_if_changed: bool) -> bool {
        !only_if_changed || self.has_change(key)
    }

    pub fn get_string(&self, key: &str, only_if_changed: bool) -> String {
        match self.get_ok(key).and_then(Value::as_str) {
            Some(s) if self.wanted(key, only_if_changed) => s.to_string(),
            _ => String::new(),
        }
    }

    pub fn get_string_ref(&self, key: &str, only_if_changed: bool) -> Option<String> {
        self.get_ok(key)
            .and_then(Value::as_str)
            .filter(|_| self.wanted(key, only_if_changed))
            .map(str::to_string)
    }

    pub fn get_bool(&self, key: &str, only_if_changed: bool) -> bool {
        self.get(key).as_bool().unwrap_or(false) && self.wanted(key, only_if_changed)
    }

    /// Distinguishes an explicit `false` from an unset attribute
    pub fn get_bool_ref(&self, key: &str, only_if_changed: bool) -> Option<bool> {
        self.get_ok_exists(key)
            .and_then(Value::as_bool)
            .filter(|_| self.wanted(key, only_if_changed))
    }

    pub fn get_int(&self, key: &str, only_if_changed: bool) -> i64 {
        match self.get(key).as_int() {
            Some(i) if self.wanted(key, only_if_changed) => i,
            _ => 0,
        }
    }

    pub fn get_int_ref(&self, key: &str, only_if_changed: bool) -> Option<i64> {
        self.get_ok_exists(key)
            .and_then(Value::as_int)
            .filter(|_| self.wanted(key, only_if_changed))
    }

    /// Ordered list of strings
    pub fn get_list(&self, key: &str, only_if_changed: bool) -> Vec<String> {
        if !self.wanted(key, only_if_changed) {
            return Vec::new();
        }
        self.get(key).strings()
    }

    /// Unordered set of strings, returned sorted
    pub fn get_set(&self, key: &str, only_if_changed: bool) -> Vec<String> {
        let mut items = self.get_list(key, only_if_changed);
        items.sort();
        items.dedup();
        items
    }

    /// Elements of a nested block attribute
    pub fn get_blocks(&self, key: &str) -> Vec<ResourceData> {
        let Some(Attribute {
            ty: ValueType::Block(schema),
            ..
        }) = self.schema.get(key)
        else {
            return Vec::new();
        };
        let schema = Arc::new(schema.clone());
        self.get(key)
            .blocks()
            .into_iter()
            .map(|attrs| Self::nested(Arc::clone(&schema), attrs.clone()))
            .collect()
    }

    /// Write one attribute, checking it against the schema
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let attr = self
            .schema
            .get(key)
            .ok_or_else(|| Error::UnknownAttribute(key.to_string()))?;
        let value = attr.ty.coerce(value.into());
        if !attr.ty.accepts(&value) {
            return Err(Error::invalid(
                key,
                format!("expected {}, got {}", attr.ty.name(), value.kind()),
            ));
        }
        self.current.insert(key.to_string(), value);
        self.raw.insert(key.to_string());
        Ok(())
    }

    /// Writer that collects errors instead of stopping at the first one
    pub fn lens(&mut self) -> Lens<'_> {
        Lens {
            data: self,
            errors: Vec::new(),
        }
    }

    /// Attributes to persist: known keys only, nulls dropped, state functions applied
    pub fn state(&self) -> Attributes {
        self.current
            .iter()
            .filter(|(_, v)| !v.is_null())
            .filter(|(k, _)| self.schema.has_key(k))
            .map(|(k, v)| (k.clone(), self.state_value(k, v)))
            .collect()
    }

    fn state_value(&self, key: &str, value: &Value) -> Value {
        match self.schema.get(key) {
            Some(attr) if self.raw.contains(key) => attr.state_value(value),
            _ => value.clone(),
        }
    }
}

/// Collecting attribute writer
pub struct Lens<'a> {
    data: &'a mut ResourceData,
    errors: Vec<Error>,
}

impl Lens<'_> {
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        if let Err(e) = self.data.set(key, value) {
            self.errors.push(e);
        }
        self
    }

    /// Every failure seen so far as a single aggregated error
    pub fn finish(self) -> Result<()> {
        Error::aggregate(self.errors)
    }
}

/// Equality that treats an absent value and a zero value alike
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, other) | (other, Value::Null) => other.is_zero(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new()
                .with("key", Attribute::string().required())
                .with("description", Attribute::string().optional())
                .with("notes", Attribute::string().optional().computed())
                .with("blacked_out", Attribute::bool().optional())
                .with("period", Attribute::int().optional().default(7200_i64))
                .with("includes", Attribute::string_list().optional())
                .with("tags", Attribute::string_set().optional())
                .with(
                    "sync",
                    Attribute::block(Schema::new().with("enabled", Attribute::bool().optional()))
                        .optional()
                        .max_items(1),
                )
                .with(
                    "password",
                    Attribute::string()
                        .optional()
                        .sensitive()
                        .state_func(|v| Value::from(format!("hash:{v}"))),
                ),
        )
    }

    fn attrs(pairs: &[(&str, Value)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_getters_return_current_values() {
        let d = ResourceData::new(
            schema(),
            "",
            Attributes::new(),
            attrs(&[
                ("key", "my-repo".into()),
                ("blacked_out", false.into()),
                ("includes", Value::string_list(["b", "a"])),
                ("tags", Value::string_list(["z", "y"])),
            ]),
        );

        assert_eq!(d.get_string("key", false), "my-repo");
        assert_eq!(d.get_string_ref("description", false), None);
        assert_eq!(d.get_bool_ref("blacked_out", false), Some(false));
        assert_eq!(d.get_bool_ref("missing", false), None);
        assert_eq!(d.get_int("period", false), 7200);
        assert_eq!(d.get_list("includes", false), vec!["b", "a"]);
        assert_eq!(d.get_set("tags", false), vec!["y", "z"]);
    }

    #[test]
    fn test_only_if_changed_returns_zero_for_unchanged() {
        let prior = attrs(&[("key", "r".into()), ("description", "same".into())]);
        let config = attrs(&[
            ("key", "r".into()),
            ("description", "same".into()),
            ("blacked_out", true.into()),
        ]);
        let d = ResourceData::new(schema(), "r", prior, config);

        assert_eq!(d.get_string("description", true), "");
        assert_eq!(d.get_string("description", false), "same");
        assert!(d.get_bool("blacked_out", true));
        assert_eq!(d.get_string_ref("description", true), None);
    }

    #[test]
    fn test_computed_keeps_prior_value() {
        let prior = attrs(&[("key", "r".into()), ("notes", "from server".into())]);
        let d = ResourceData::new(schema(), "r", prior, attrs(&[("key", "r".into())]));
        assert_eq!(d.get_string("notes", false), "from server");
        assert!(!d.has_change("notes"));
    }

    #[test]
    fn test_state_func_applies_to_change_detection() {
        let prior = attrs(&[("key", "r".into()), ("password", "hash:\"secret\"".into())]);
        let config = attrs(&[("key", "r".into()), ("password", "secret".into())]);
        let d = ResourceData::new(schema(), "r", prior, config);

        assert!(!d.has_change("password"));
        assert_eq!(d.state()["password"], Value::from("hash:\"secret\""));
    }

    #[test]
    fn test_stored_state_is_not_transformed_again() {
        let stored = attrs(&[("key", "r".into()), ("password", "hash:\"secret\"".into())]);
        let mut d = ResourceData::from_state(schema(), "r", stored.clone());
        assert_eq!(d.state(), stored);

        d.set("password", "other").unwrap();
        assert_eq!(d.state()["password"], Value::from("hash:\"other\""));
    }

    #[test]
    fn test_lens_aggregates_errors() {
        let mut d = ResourceData::import(schema(), "r");
        let mut lens = d.lens();
        lens.set("key", "r")
            .set("nope", "x")
            .set("blacked_out", "not a bool")
            .set("tags", Value::string_list(["a"]));

        let err = lens.finish().unwrap_err();
        match err {
            Error::Aggregate(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(d.get_string("key", false), "r");
        assert_eq!(d.get("tags"), &Value::string_set(["a"]));
    }

    #[test]
    fn test_nested_blocks() {
        let mut sync = Attributes::new();
        sync.insert("enabled".into(), true.into());
        let d = ResourceData::new(
            schema(),
            "",
            Attributes::new(),
            attrs(&[("key", "r".into()), ("sync", Value::block(sync))]),
        );

        let blocks = d.get_blocks("sync");
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].get_bool("enabled", true));
    }

    #[test]
    fn test_clear_id_marks_absent() {
        let mut d = ResourceData::import(schema(), "r");
        assert!(!d.is_absent());
        d.clear_id();
        assert!(d.is_absent());
    }
}
