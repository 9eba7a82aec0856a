//! Projection filters for log reads.
//!
//! A [`LogFilter`] is a disjunction of [`FilterCondition`]s, and each
//! condition is a conjunction of field equalities. Fields are looked up in
//! the entry's projection, except [`PRIMARY_KEY_FIELD`] which compares the
//! entry's primary key. An entry without a projection only passes
//! conditions that test nothing but the primary key.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Reserved condition field matching the entry's primary key.
pub const PRIMARY_KEY_FIELD: &str = "$primaryKey";

/// A conjunction of field equalities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterCondition {
    fields: BTreeMap<String, Value>,
}

impl FilterCondition {
    /// Creates a condition that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field equality.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Adds a field equality in place.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Returns the tested fields, in field order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns `true` if no field is tested.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Evaluates the condition against one log entry.
    pub fn matches(&self, primary_key: &str, projection: Option<&Map<String, Value>>) -> bool {
        self.fields.iter().all(|(field, expected)| {
            if field == PRIMARY_KEY_FIELD {
                return text_matches(primary_key, expected);
            }
            projection
                .and_then(|p| p.get(field))
                .is_some_and(|actual| value_matches(actual, expected))
        })
    }
}

/// A disjunction of [`FilterCondition`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogFilter {
    conditions: Vec<FilterCondition>,
}

impl LogFilter {
    /// Creates a filter with no conditions. It matches nothing until one is
    /// added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter from a single condition.
    pub fn single(condition: FilterCondition) -> Self {
        Self {
            conditions: vec![condition],
        }
    }

    /// Creates a filter matching any of `conditions`.
    pub fn any_of(conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        Self {
            conditions: conditions.into_iter().collect(),
        }
    }

    /// Creates a filter on a single field equality.
    pub fn field(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(FilterCondition::new().with(field, value))
    }

    /// Adds an alternative condition.
    pub fn or(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Returns the alternatives.
    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    /// Evaluates the filter against one log entry.
    pub fn matches(&self, primary_key: &str, projection: Option<&Map<String, Value>>) -> bool {
        self.conditions
            .iter()
            .any(|condition| condition.matches(primary_key, projection))
    }
}

/// Query strings carry text only, so a text expectation also matches a
/// number or boolean with the same rendering.
fn value_matches(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::Number(_) | Value::Bool(_), Value::String(text)) => actual.to_string() == *text,
        _ => false,
    }
}

fn text_matches(actual: &str, expected: &Value) -> bool {
    match expected {
        Value::String(text) => actual == text,
        Value::Number(_) | Value::Bool(_) => actual == expected.to_string(),
        _ => false,
    }
}
