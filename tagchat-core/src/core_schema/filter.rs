/*
    filter.rs - Immutable shape descriptors for discovery

    A SchemaFilter describes which payloads a discovery pass should hand back:
    - required fields that must be present on `value`
    - per-field constraints (type or enumerated literal set)
    - an optional restriction to a single publishing actor

    Constraints only apply to fields that are present, so a filter with a
    constraint on an optional field still accepts payloads that omit it.
*/

use crate::core_store::StoredObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Constraint applied to a single payload field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum FieldConstraint {
    /// Any JSON string
    String,
    /// A non-negative integer (millisecond timestamps)
    Integer,
    /// An array whose items are all strings
    StringArray,
    /// A string equal to one of the listed literals
    OneOf(Vec<String>),
}

impl FieldConstraint {
    /// Build an enumerated constraint from literals
    pub fn one_of<I, S>(literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldConstraint::OneOf(literals.into_iter().map(Into::into).collect())
    }

    /// Check a field value against this constraint
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldConstraint::String => value.is_string(),
            FieldConstraint::Integer => value.as_u64().is_some(),
            FieldConstraint::StringArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            FieldConstraint::OneOf(literals) => value
                .as_str()
                .is_some_and(|s| literals.iter().any(|literal| literal == s)),
        }
    }
}

/// Immutable filter descriptor handed to the discovery capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFilter {
    kind: String,
    required: Vec<String>,
    properties: BTreeMap<String, FieldConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    actor: Option<String>,
}

impl SchemaFilter {
    /// Start an empty filter labelled with the object kind it selects
    pub fn new(kind: impl Into<String>) -> Self {
        SchemaFilter {
            kind: kind.into(),
            required: Vec::new(),
            properties: BTreeMap::new(),
            actor: None,
        }
    }

    /// Add a required field with its constraint
    pub fn require(mut self, field: impl Into<String>, constraint: FieldConstraint) -> Self {
        let field = field.into();
        if !self.required.contains(&field) {
            self.required.push(field.clone());
        }
        self.properties.insert(field, constraint);
        self
    }

    /// Add a constraint for a field that may be absent
    pub fn optional(mut self, field: impl Into<String>, constraint: FieldConstraint) -> Self {
        self.properties.insert(field.into(), constraint);
        self
    }

    /// Only accept objects published by `actor`
    pub fn from_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    /// Check a bare payload, ignoring the actor restriction
    pub fn matches_value(&self, value: &Value) -> bool {
        let Some(fields) = value.as_object() else {
            return false;
        };

        if !self.required.iter().all(|field| fields.contains_key(field)) {
            return false;
        }

        self.properties.iter().all(|(field, constraint)| match fields.get(field) {
            Some(value) => constraint.accepts(value),
            None => true,
        })
    }

    /// Check a discovered object, including the actor restriction
    pub fn matches(&self, object: &StoredObject) -> bool {
        if let Some(actor) = &self.actor {
            if object.actor != *actor {
                return false;
            }
        }
        self.matches_value(&object.value)
    }
}
