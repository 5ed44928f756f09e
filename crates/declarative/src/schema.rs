//! Attribute schemas and validators
//!
//! A [`Schema`] maps snake_case attribute names to [`Attribute`]
//! descriptors. Schemas are plain values built by functions: composing two
//! schemas with [`Schema::merge`] returns a fresh schema in which the later
//! definition wins on key collisions.

use crate::types::Diagnostic;
use crate::value::{Attributes, Value};
use regex::Regex;
use std::collections::BTreeMap;

/// Decides whether a change from `old` (state) to `new` (declared) is noise
pub type DiffSuppressFn = fn(key: &str, old: &Value, new: &Value) -> bool;

/// Transforms a declared value before it is stored in state
pub type StateFn = fn(&Value) -> Value;

/// Declared type of an attribute
#[derive(Debug, Clone)]
pub enum ValueType {
    String,
    Bool,
    Int,
    List(Box<ValueType>),
    Set(Box<ValueType>),
    /// List of nested blocks, each described by the inner schema
    Block(Schema),
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Block(_) => "block",
        }
    }

    /// Normalise a value to this type's canonical shape.
    ///
    /// Configuration and state files have no set syntax, so lists are
    /// turned into sets where a set is declared. A bare map is accepted as
    /// a one-element block list.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (Self::Set(inner), Value::List(items)) => {
                Value::Set(items.into_iter().map(|v| inner.coerce(v)).collect())
            }
            (Self::Set(inner), Value::Set(items)) => {
                Value::Set(items.into_iter().map(|v| inner.coerce(v)).collect())
            }
            (Self::List(inner), Value::List(items)) => {
                Value::List(items.into_iter().map(|v| inner.coerce(v)).collect())
            }
            (Self::Block(schema), Value::Map(map)) => Value::List(vec![Value::Map(schema.coerce(map))]),
            (Self::Block(schema), Value::List(items)) => Value::List(
                items
                    .into_iter()
                    .map(|v| match v {
                        Value::Map(map) => Value::Map(schema.coerce(map)),
                        other => other,
                    })
                    .collect(),
            ),
            (_, other) => other,
        }
    }

    fn check(&self, path: &str, value: &Value, diagnostics: &mut Vec<Diagnostic>) {
        match (self, value) {
            (_, Value::Null)
            | (Self::String, Value::String(_))
            | (Self::Bool, Value::Bool(_))
            | (Self::Int, Value::Int(_)) => {}
            (Self::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.check(&format!("{path}.{i}"), item, diagnostics);
                }
            }
            (Self::Set(inner), Value::Set(items)) => {
                for item in items {
                    inner.check(path, item, diagnostics);
                }
            }
            (Self::Block(schema), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{path}.{i}");
                    match item {
                        Value::Map(map) => {
                            diagnostics.extend(schema.validate_at(&item_path, map));
                        }
                        other => diagnostics.push(Diagnostic::error(
                            item_path,
                            format!("expected block, got {}", other.kind()),
                        )),
                    }
                }
            }
            (expected, got) => diagnostics.push(Diagnostic::error(
                path,
                format!("expected {}, got {}", expected.name(), got.kind()),
            )),
        }
    }

    /// Whether `value` has this type's shape (null always fits).
    ///
    /// Only shapes are compared; requiredness and validators are not run.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null)
            | (Self::String, Value::String(_))
            | (Self::Bool, Value::Bool(_))
            | (Self::Int, Value::Int(_)) => true,
            (Self::List(inner), Value::List(items)) => items.iter().all(|v| inner.accepts(v)),
            (Self::Set(inner), Value::Set(items)) => items.iter().all(|v| inner.accepts(v)),
            (Self::Block(schema), Value::List(items)) => items.iter().all(|item| match item {
                Value::Map(map) => map.iter().all(|(k, v)| {
                    schema.get(k).is_some_and(|attr| attr.ty.accepts(v))
                }),
                _ => false,
            }),
            _ => false,
        }
    }
}

/// Descriptor for a single attribute
#[derive(Debug, Clone)]
pub struct Attribute {
    pub ty: ValueType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    /// Changing the value replaces the resource
    pub force_new: bool,
    /// Value is masked in plans and never logged
    pub sensitive: bool,
    pub default: Option<Value>,
    pub max_items: Option<usize>,
    pub description: String,
    /// Deprecation message shown when the attribute is declared
    pub deprecated: Option<String>,
    pub validator: Option<Validator>,
    pub diff_suppress: Option<DiffSuppressFn>,
    pub state_func: Option<StateFn>,
}

impl Attribute {
    pub fn new(ty: ValueType) -> Self {
        Self {
            ty,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            default: None,
            max_items: None,
            description: String::new(),
            deprecated: None,
            validator: None,
            diff_suppress: None,
            state_func: None,
        }
    }

    pub fn string() -> Self {
        Self::new(ValueType::String)
    }

    pub fn bool() -> Self {
        Self::new(ValueType::Bool)
    }

    pub fn int() -> Self {
        Self::new(ValueType::Int)
    }

    pub fn string_list() -> Self {
        Self::new(ValueType::List(Box::new(ValueType::String)))
    }

    pub fn string_set() -> Self {
        Self::new(ValueType::Set(Box::new(ValueType::String)))
    }

    pub fn block(schema: Schema) -> Self {
        Self::new(ValueType::Block(schema))
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self.required = false;
        self
    }

    #[must_use]
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    #[must_use]
    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    #[must_use]
    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecated = Some(message.into());
        self
    }

    #[must_use]
    pub fn validate(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    #[must_use]
    pub fn diff_suppress(mut self, f: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(f);
        self
    }

    #[must_use]
    pub fn state_func(mut self, f: StateFn) -> Self {
        self.state_func = Some(f);
        self
    }

    /// Computed and not settable from configuration
    pub fn is_read_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    /// Apply the state function, if any
    pub fn state_value(&self, value: &Value) -> Value {
        match self.state_func {
            Some(f) if !value.is_null() => f(value),
            _ => value.clone(),
        }
    }
}

/// Declarative schema for one resource type (or one nested block)
#[derive(Debug, Clone, Default)]
pub struct Schema {
    attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an attribute
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, attribute: Attribute) {
        self.attributes.insert(name.into(), attribute);
    }

    /// Compose two schemas; attributes of `other` override ours
    #[must_use]
    pub fn merge(mut self, other: Schema) -> Self {
        self.attributes.extend(other.attributes);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn has_key(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.attributes.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.attributes.keys()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Normalise every known attribute to its declared shape
    pub fn coerce(&self, attributes: Attributes) -> Attributes {
        attributes
            .into_iter()
            .map(|(k, v)| {
                let v = match self.attributes.get(&k) {
                    Some(attr) => attr.ty.coerce(v),
                    None => v,
                };
                (k, v)
            })
            .collect()
    }

    /// Fill absent attributes that declare a default, inside nested blocks too
    pub fn apply_defaults(&self, attributes: &mut Attributes) {
        for (name, attr) in &self.attributes {
            if let Some(default) = &attr.default {
                let absent = attributes.get(name).is_none_or(Value::is_null);
                if absent {
                    attributes.insert(name.clone(), default.clone());
                }
            }
            if let ValueType::Block(schema) = &attr.ty
                && let Some(Value::List(items)) = attributes.get_mut(name)
            {
                for item in items {
                    if let Value::Map(map) = item {
                        schema.apply_defaults(map);
                    }
                }
            }
        }
    }

    /// Validate declared configuration, returning every problem found
    pub fn validate(&self, config: &Attributes) -> Vec<Diagnostic> {
        self.validate_at("", &self.coerce(config.clone()))
    }

    fn validate_at(&self, prefix: &str, config: &Attributes) -> Vec<Diagnostic> {
        let path = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}.{name}")
            }
        };
        let mut diagnostics = Vec::new();

        for name in config.keys() {
            if !self.attributes.contains_key(name) {
                diagnostics.push(Diagnostic::error(
                    path(name),
                    "an argument with this name is not expected here",
                ));
            }
        }

        for (name, attr) in &self.attributes {
            let value = config.get(name).unwrap_or(&Value::Null);
            let at = path(name);

            if value.is_null() {
                if attr.required {
                    diagnostics.push(Diagnostic::error(at, "the argument is required"));
                }
                continue;
            }
            if attr.is_read_only() {
                diagnostics.push(Diagnostic::error(
                    at,
                    "the value is computed and cannot be configured",
                ));
                continue;
            }
            if let Some(message) = &attr.deprecated {
                diagnostics.push(Diagnostic::warning(at.clone(), message.clone()));
            }

            let before = diagnostics.len();
            attr.ty.check(&at, value, &mut diagnostics);
            if diagnostics.len() > before {
                continue;
            }

            if let Some(max) = attr.max_items {
                let count = value.elements().len();
                if count > max {
                    diagnostics.push(Diagnostic::error(
                        at.clone(),
                        format!("at most {max} item(s) allowed, got {count}"),
                    ));
                }
            }
            if let Some(validator) = &attr.validator {
                diagnostics.extend(validator.check(&at, value));
            }
        }

        diagnostics
    }
}

/// Value validators attached to attributes
#[derive(Debug, Clone)]
pub enum Validator {
    /// Every inner validator must pass
    All(Vec<Validator>),
    /// Rejects strings matching the pattern
    StringDoesNotMatch {
        pattern: &'static Regex,
        message: &'static str,
    },
    /// Rejects strings containing any of the characters
    StringDoesNotContainAny(&'static str),
    /// Accepts only the listed strings
    StringInSlice(Vec<String>),
    /// Accepts absolute http(s) URLs with a host
    UrlWithHttpOrHttps,
    /// Accepts integers >= the bound
    IntAtLeast(i64),
}

impl Validator {
    /// Check a non-null value, returning diagnostics for `path`
    pub fn check(&self, path: &str, value: &Value) -> Vec<Diagnostic> {
        let fail = |summary: String| vec![Diagnostic::error(path, summary)];
        match self {
            Self::All(inner) => inner.iter().flat_map(|v| v.check(path, value)).collect(),
            Self::StringDoesNotMatch { pattern, message } => match value.as_str() {
                Some(s) if pattern.is_match(s) => fail(format!("invalid value for {path} ({message})")),
                Some(_) => Vec::new(),
                None => fail(format!("expected type of {path} to be string")),
            },
            Self::StringDoesNotContainAny(chars) => match value.as_str() {
                Some(s) if s.chars().any(|c| chars.contains(c)) => fail(format!(
                    "expected value of {path} to not contain any of {chars:?}, got {s}"
                )),
                Some(_) => Vec::new(),
                None => fail(format!("expected type of {path} to be string")),
            },
            Self::StringInSlice(allowed) => match value.as_str() {
                Some(s) if allowed.iter().any(|a| a == s) => Vec::new(),
                Some(s) => fail(format!("expected {path} to be one of {allowed:?}, got {s}")),
                None => fail(format!("expected type of {path} to be string")),
            },
            Self::UrlWithHttpOrHttps => match value.as_str() {
                Some(s) => match url::Url::parse(s) {
                    Ok(u) if matches!(u.scheme(), "http" | "https") && u.has_host() => Vec::new(),
                    Ok(_) => fail(format!(
                        "expected {path} to have a url with schema of: \"http,https\", got {s}"
                    )),
                    Err(e) => fail(format!("expected {path} to be a valid url, got {s}: {e}")),
                },
                None => fail(format!("expected type of {path} to be string")),
            },
            Self::IntAtLeast(min) => match value.as_int() {
                Some(i) if i >= *min => Vec::new(),
                Some(i) => fail(format!("expected {path} to be at least ({min}), got {i}")),
                None => fail(format!("expected type of {path} to be integer")),
            },
        }
    }

    /// Convenience for `StringInSlice` from string literals
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::StringInSlice(values.into_iter().map(Into::into).collect())
    }
}
