//! Record <-> JSON body mapping
//!
//! Request bodies carry only the input fields that are set. Responses are
//! unwrapped from their envelope and merged field by field.

use serde_json::{Map, Value};

use super::record::{invalid, FieldValue, Record};
use super::registry::{FieldRole, ResourceDef};
use crate::virtfusion::ApiError;

/// Which lifecycle call a body is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
}

/// Serialize the set input fields of a record.
///
/// Unset fields are left out entirely. Computed, path and local fields are
/// never sent, and immutable fields are dropped from update bodies.
pub fn encode_body(def: &ResourceDef, record: &Record, op: Operation) -> Result<Value, ApiError> {
    let mut body = Map::new();

    for field in def.fields.iter().filter(|f| f.is_sent()) {
        if op == Operation::Update && field.immutable {
            continue;
        }
        match record.get(&field.name) {
            Some(value) if value.matches(field.field_type) => {
                body.insert(field.request_key().to_string(), value.to_json());
            }
            Some(_) => return Err(invalid(field)),
            None if op == Operation::Create && field.role == FieldRole::Required => {
                return Err(ApiError::MissingField {
                    field: field.name.clone(),
                });
            }
            None => {}
        }
    }

    // Required path and local inputs are checked too, they just don't land in the body
    if op == Operation::Create {
        if let Some(field) = def
            .input_fields()
            .filter(|f| !f.is_sent() && f.role == FieldRole::Required)
            .find(|f| !record.contains(&f.name))
        {
            return Err(ApiError::MissingField {
                field: field.name.clone(),
            });
        }
    }

    Ok(Value::Object(body))
}

/// Merge a response object into a record.
///
/// Only fields present (and non-null) in the response are touched. An `id`
/// that disagrees with the record's existing id is rejected.
pub fn decode_into(def: &ResourceDef, record: &mut Record, object: &Value) -> Result<(), ApiError> {
    for field in def.fields.iter().filter(|f| f.is_read_back()) {
        let Some(raw) = field
            .response_keys()
            .filter_map(|key| extract_path(object, key))
            .find(|v| !v.is_null())
        else {
            continue;
        };
        let value = FieldValue::from_json(field.field_type, raw).ok_or_else(|| {
            ApiError::MalformedResponse(format!(
                "`{}` should be {}, got {}",
                field.response_key(),
                field.field_type.describe(),
                raw
            ))
        })?;

        if field.name == "id" {
            if let (Some(local), Some(remote)) = (record.id(), value.as_int()) {
                if local != remote {
                    return Err(ApiError::IdChanged { local, remote });
                }
            }
        }

        record.set(&field.name, value);
    }

    Ok(())
}

/// Fill unset optional fields with their schema default
pub fn apply_schema_defaults(def: &ResourceDef, record: &mut Record) {
    for field in &def.fields {
        if record.contains(&field.name) {
            continue;
        }
        if let Some(value) = field
            .default
            .as_ref()
            .and_then(|d| FieldValue::from_json(field.field_type, d))
        {
            record.set(&field.name, value);
        }
    }
}

/// Substitute `{field}` placeholders with integer values from the record
pub fn render_path(template: &str, record: &Record) -> Result<String, ApiError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            return Err(ApiError::InvalidInput(format!("unterminated placeholder in `{}`", template)));
        };
        let name = &after[..end];
        let value = record.int(name).ok_or_else(|| {
            if name == "id" {
                ApiError::MissingId
            } else {
                ApiError::MissingField {
                    field: name.to_string(),
                }
            }
        })?;
        out.push_str(&value.to_string());
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Follow a dot-notation path into a JSON value. An empty path returns the
/// value itself.
pub fn extract_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }

    let mut current = value;
    for part in path.split('.') {
        current = match part.parse::<usize>() {
            Ok(idx) => current.get(idx)?,
            Err(_) => current.get(part)?,
        };
    }
    Some(current)
}

/// Unwrap the response envelope. Falls back to the top-level object when
/// the envelope key is missing.
pub fn unwrap_envelope<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    match extract_path(value, path) {
        Some(inner) if inner.is_object() => Some(inner),
        _ if value.is_object() => Some(value),
        _ => None,
    }
}
