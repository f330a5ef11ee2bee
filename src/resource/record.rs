//! Resource Records
//!
//! A record is the typed state of one remote object. Unset fields are absent
//! from the map, which is what keeps "omitted" distinct from zero.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::registry::{FieldDef, FieldType, ResourceDef};
use crate::virtfusion::ApiError;

/// Value of a single field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Bool(bool),
    Str(String),
    IntList(Vec<i64>),
}

impl FieldValue {
    /// Convert a JSON value into a field value of the given type.
    /// Lenient about the shapes the API is known to use: numeric strings for
    /// integers and 0/1 for booleans. Returns `None` for `null` or a mismatch.
    pub fn from_json(field_type: FieldType, value: &Value) -> Option<Self> {
        match (field_type, value) {
            (_, Value::Null) => None,
            (FieldType::Int, Value::Number(n)) => n.as_i64().map(FieldValue::Int),
            (FieldType::Int, Value::String(s)) => s.trim().parse().ok().map(FieldValue::Int),
            (FieldType::Bool, Value::Bool(b)) => Some(FieldValue::Bool(*b)),
            (FieldType::Bool, Value::Number(n)) => match n.as_i64() {
                Some(0) => Some(FieldValue::Bool(false)),
                Some(1) => Some(FieldValue::Bool(true)),
                _ => None,
            },
            (FieldType::String, Value::String(s)) => Some(FieldValue::Str(s.clone())),
            (FieldType::String, Value::Number(n)) => Some(FieldValue::Str(n.to_string())),
            (FieldType::IntList, Value::Array(items)) => items
                .iter()
                .map(|v| v.as_i64())
                .collect::<Option<Vec<_>>>()
                .map(FieldValue::IntList),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Int(i) => Value::from(*i),
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Str(s) => Value::String(s.clone()),
            FieldValue::IntList(items) => Value::from(items.clone()),
        }
    }

    pub fn matches(&self, field_type: FieldType) -> bool {
        matches!(
            (self, field_type),
            (FieldValue::Int(_), FieldType::Int)
                | (FieldValue::Bool(_), FieldType::Bool)
                | (FieldValue::Str(_), FieldType::String)
                | (FieldValue::IntList(_), FieldType::IntList)
        )
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<Vec<i64>> for FieldValue {
    fn from(v: Vec<i64>) -> Self {
        FieldValue::IntList(v)
    }
}

/// Typed state of one remote object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record from nothing but its identifier
    pub fn with_id(id: i64) -> Self {
        Self::new().with("id", id)
    }

    /// Builder-style setter
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn unset(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_int)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(FieldValue::as_bool)
    }

    pub fn id(&self) -> Option<i64> {
        self.int("id")
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record from a caller-supplied JSON object, checking every key
    /// against the kind's field table. `null` values count as unset.
    pub fn from_input(kind: &str, def: &ResourceDef, input: &Value) -> Result<Self, ApiError> {
        let Some(object) = input.as_object() else {
            return Err(ApiError::InvalidInput(format!("{} input must be a JSON object", kind)));
        };

        let mut record = Record::new();
        for (key, value) in object {
            let Some(field) = def.field(key) else {
                return Err(ApiError::UnknownField {
                    kind: kind.to_string(),
                    field: key.clone(),
                });
            };
            if value.is_null() {
                continue;
            }
            let parsed = FieldValue::from_json(field.field_type, value).ok_or_else(|| invalid(field))?;
            record.fields.insert(field.name.clone(), parsed);
        }

        Ok(record)
    }

    /// Render as a plain JSON object keyed by field name
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        Value::Object(map)
    }
}

pub(crate) fn invalid(field: &FieldDef) -> ApiError {
    ApiError::InvalidField {
        field: field.name.clone(),
        expected: field.field_type.describe(),
    }
}
