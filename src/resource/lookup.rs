//! Auxiliary Lookups
//!
//! Resolves a human-readable name (an OS template, say) to the numeric id a
//! request body needs. At most one GET per lookup field.

use serde_json::Value;
use tracing::debug;

use super::codec::extract_path;
use super::record::{FieldValue, Record};
use super::registry::{FieldType, LookupDef, ResourceDef};
use crate::config::ProviderDefaults;
use crate::virtfusion::{ApiError, VirtFusionClient};

/// Fill every unset lookup field of the record.
///
/// The name comes from the lookup's source field, else from the named
/// provider default. A field with no name available is left unset.
pub async fn resolve_lookups(
    def: &ResourceDef,
    record: &mut Record,
    client: &VirtFusionClient,
    defaults: &ProviderDefaults,
) -> Result<(), ApiError> {
    for field in &def.fields {
        let Some(lookup) = &field.lookup else {
            continue;
        };
        if record.contains(&field.name) {
            continue;
        }

        let name = record
            .str(&lookup.source)
            .map(str::to_string)
            .or_else(|| {
                lookup
                    .provider_default
                    .as_deref()
                    .and_then(|d| defaults.get(d))
                    .and_then(|v| v.as_str().map(str::to_string))
            });
        let Some(name) = name else {
            continue;
        };

        let id = resolve_one(client, lookup, &name).await?;
        debug!("Resolved {} `{}` to id {}", lookup.collection, name, id);
        record.set(&field.name, FieldValue::Int(id));
    }

    Ok(())
}

async fn resolve_one(client: &VirtFusionClient, lookup: &LookupDef, name: &str) -> Result<i64, ApiError> {
    // Numeric names are ids already
    if let Ok(id) = name.trim().parse::<i64>() {
        return Ok(id);
    }

    let response = client.get(&lookup.collection).await?;
    if !response.is_success() {
        return Err(ApiError::unexpected(response.status, &response.body));
    }
    let json = response.json()?;

    let items = extract_path(&json, &lookup.response_path)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ApiError::MalformedResponse(format!(
                "{} listing has no `{}` array",
                lookup.collection, lookup.response_path
            ))
        })?;

    find_id(items, lookup, name).ok_or_else(|| ApiError::LookupFailed {
        collection: lookup.collection.clone(),
        name: name.to_string(),
    })
}

/// Case-insensitive match on `match_key`, returning the entry's `id_key`
fn find_id(items: &[Value], lookup: &LookupDef, name: &str) -> Option<i64> {
    items
        .iter()
        .find(|item| {
            extract_path(item, &lookup.match_key)
                .and_then(Value::as_str)
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name))
        })
        .and_then(|item| extract_path(item, &lookup.id_key))
        .and_then(|id| FieldValue::from_json(FieldType::Int, id))
        .and_then(|v| v.as_int())
}
