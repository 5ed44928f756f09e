//! Attribute diffs between stored state and declared configuration

use crate::schema::Schema;
use crate::value::{Attributes, Value};
use serde::{Deserialize, Serialize};

/// One attribute whose declared value differs from state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDiff {
    pub key: String,
    /// Value in state
    pub old: Value,
    /// Declared value, after the attribute's state function
    pub new: Value,
    /// Changing this attribute replaces the resource
    pub force_new: bool,
    /// Values must not be displayed
    pub sensitive: bool,
}

impl AttributeDiff {
    /// Render as `key: old → new`, masking sensitive values
    pub fn render(&self) -> String {
        let show = |v: &Value| {
            if self.sensitive {
                "(sensitive)".to_string()
            } else {
                v.to_string()
            }
        };
        let suffix = if self.force_new { " (forces replacement)" } else { "" };
        format!("{}: {} → {}{suffix}", self.key, show(&self.old), show(&self.new))
    }
}

/// Compare stored state with declared configuration.
///
/// Attributes the configuration leaves unset are skipped when they are
/// computed, since the server owns them. Absent values and zero values are
/// considered equal. Diff-suppress functions are consulted last.
pub fn compute_diffs(schema: &Schema, state: &Attributes, config: &Attributes) -> Vec<AttributeDiff> {
    let mut config = schema.coerce(config.clone());
    schema.apply_defaults(&mut config);
    let state = schema.coerce(state.clone());

    let mut diffs = Vec::new();
    for (key, attr) in schema.iter() {
        let declared = config.get(key).unwrap_or(&Value::Null);
        if declared.is_null() && attr.computed {
            continue;
        }
        let new = attr.state_value(declared);
        let old = state.get(key).cloned().unwrap_or_default();

        if equivalent(&old, &new) {
            continue;
        }
        if let Some(suppress) = attr.diff_suppress
            && suppress(key, &old, &new)
        {
            continue;
        }

        diffs.push(AttributeDiff {
            key: key.clone(),
            old,
            new,
            force_new: attr.force_new,
            sensitive: attr.sensitive,
        });
    }
    diffs
}

/// Whether any diff requires replacing the resource
pub fn requires_replacement(diffs: &[AttributeDiff]) -> bool {
    diffs.iter().any(|d| d.force_new)
}

fn equivalent(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, other) | (other, Value::Null) => other.is_zero(),
        _ => a == b,
    }
}
