//! Generic REST CRUD adapter
//!
//! One adapter serves every resource kind. The kind's field table decides
//! which fields go into request bodies, which come back from responses, and
//! which paths are hit.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use super::codec::{apply_schema_defaults, decode_into, encode_body, render_path, unwrap_envelope, Operation};
use super::lookup::resolve_lookups;
use super::record::Record;
use super::registry::{get_resource, Generator, ResourceDef};
use crate::config::ProviderDefaults;
use crate::provider::ProviderData;
use crate::virtfusion::ApiError;

/// Lifecycle of a managed resource
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name
    fn type_name(&self) -> &str;

    /// Hand over the configured client and defaults
    fn configure(&mut self, data: Arc<ProviderData>);

    /// Create the remote object from a planned record
    async fn create(&self, planned: Record) -> Result<Record, ApiError>;

    /// Refresh a record. `None` means the remote object is gone.
    async fn read(&self, state: Record) -> Result<Option<Record>, ApiError>;

    /// Apply a planned record on top of the prior state
    async fn update(&self, prior: &Record, planned: Record) -> Result<Record, ApiError>;

    /// Delete the remote object
    async fn delete(&self, state: &Record) -> Result<(), ApiError>;

    /// Adopt an existing remote object by id
    async fn import(&self, id: i64) -> Result<Option<Record>, ApiError> {
        self.read(Record::with_id(id)).await
    }
}

/// Resource driven by a [`ResourceDef`] field table
#[derive(Debug, Clone)]
pub struct ResourceAdapter {
    key: String,
    def: &'static ResourceDef,
    data: Option<Arc<ProviderData>>,
}

impl ResourceAdapter {
    pub fn new(key: &str) -> Result<Self, ApiError> {
        let def = get_resource(key).ok_or_else(|| ApiError::UnknownKind(key.to_string()))?;
        Ok(Self {
            key: key.to_string(),
            def,
            data: None,
        })
    }

    pub fn definition(&self) -> &'static ResourceDef {
        self.def
    }

    fn data(&self) -> Result<&ProviderData, ApiError> {
        self.data
            .as_deref()
            .ok_or_else(|| ApiError::NotConfigured(self.key.clone()))
    }
}

#[async_trait]
impl Resource for ResourceAdapter {
    fn type_name(&self) -> &str {
        &self.key
    }

    fn configure(&mut self, data: Arc<ProviderData>) {
        self.data = Some(data);
    }

    async fn create(&self, planned: Record) -> Result<Record, ApiError> {
        let data = self.data()?;
        let def = self.def;

        let mut record = planned;
        for field in def.computed_fields() {
            record.unset(&field.name);
        }
        fill_defaults(def, &mut record, &data.defaults);
        resolve_lookups(def, &mut record, &data.client, &data.defaults).await?;

        let body = encode_body(def, &record, Operation::Create)?;
        let path = render_path(&def.collection, &record)?;

        let response = data.client.post(&path, &body).await?;
        if response.status == 422 {
            return Err(ApiError::validation(&response.body));
        }
        if !def.create_status.contains(&response.status) {
            return Err(ApiError::unexpected(response.status, &response.body));
        }

        copy_id_from_source(def, &mut record);
        let json = response.json()?;
        if let Some(object) = unwrap_envelope(&json, &def.response_path) {
            decode_into(def, &mut record, object)?;
        }

        let Some(id) = record.id() else {
            return Err(ApiError::MalformedResponse(format!(
                "{} create response carried no id",
                def.display_name
            )));
        };
        apply_schema_defaults(def, &mut record);

        info!("Created {} {}", def.display_name, id);
        Ok(record)
    }

    async fn read(&self, state: Record) -> Result<Option<Record>, ApiError> {
        let data = self.data()?;
        let def = self.def;

        let mut record = state;
        let path = render_path(&def.item_path(), &record)?;

        let response = data.client.get(&path).await?;
        if response.status == 404 {
            info!("{} at {} no longer exists", def.display_name, path);
            return Ok(None);
        }
        if !response.is_success() {
            return Err(ApiError::unexpected(response.status, &response.body));
        }

        let json = response.json()?;
        let object = unwrap_envelope(&json, &def.response_path)
            .ok_or_else(|| ApiError::MalformedResponse(format!("{} body is not an object", path)))?;
        decode_into(def, &mut record, object)?;

        // Imported records only know their id
        if let (Some(source), Some(id)) = (&def.id_from, record.id()) {
            if !record.contains(source) {
                record.set(source, id);
            }
        }
        apply_schema_defaults(def, &mut record);

        Ok(Some(record))
    }

    async fn update(&self, prior: &Record, planned: Record) -> Result<Record, ApiError> {
        let data = self.data()?;
        let def = self.def;

        let mut record = merge_planned(def, prior, planned)?;

        let Some(method) = def.update_method else {
            debug!("{} has no update call, keeping planned state", def.display_name);
            apply_schema_defaults(def, &mut record);
            return Ok(record);
        };

        let body = encode_body(def, &record, Operation::Update)?;
        if body.as_object().is_some_and(|b| b.is_empty()) {
            debug!("Nothing to send for {} update", def.display_name);
            apply_schema_defaults(def, &mut record);
            return Ok(record);
        }

        let path = render_path(&def.item_path(), &record)?;
        let response = data.client.send_json(method.as_method(), &path, &body).await?;
        match response.status {
            422 => return Err(ApiError::validation(&response.body)),
            404 => return Err(ApiError::NotFound { path }),
            _ if !response.is_success() => {
                return Err(ApiError::unexpected(response.status, &response.body))
            }
            _ => {}
        }

        let json = response.json()?;
        if let Some(object) = unwrap_envelope(&json, &def.response_path) {
            decode_into(def, &mut record, object)?;
        }
        apply_schema_defaults(def, &mut record);

        info!("Updated {} {}", def.display_name, path);
        Ok(record)
    }

    async fn delete(&self, state: &Record) -> Result<(), ApiError> {
        let data = self.data()?;
        let def = self.def;
        let id = state.id().ok_or(ApiError::MissingId)?;

        if !def.remote_delete {
            info!("{} {} cannot be deleted remotely, dropping it from state", def.display_name, id);
            return Ok(());
        }

        let path = render_path(&def.item_path(), state)?;
        let response = data.client.delete(&path).await?;
        match response.status {
            404 => info!("{} {} was already gone", def.display_name, id),
            422 => return Err(ApiError::validation(&response.body)),
            _ if response.is_success() => info!("Deleted {} {}", def.display_name, id),
            status => return Err(ApiError::unexpected(status, &response.body)),
        }

        Ok(())
    }
}

/// Fill omitted inputs from provider defaults and generators
fn fill_defaults(def: &ResourceDef, record: &mut Record, defaults: &ProviderDefaults) {
    for field in def.input_fields() {
        if record.contains(&field.name) {
            continue;
        }
        if let Some(value) = field.provider_default.as_deref().and_then(|d| defaults.get(d)) {
            if value.matches(field.field_type) {
                record.set(&field.name, value);
                continue;
            }
        }
        if let Some(Generator::RandomName) = field.generate {
            record.set(&field.name, random_name());
        }
    }
}

/// `tf-` followed by the first 8 hex chars of a v4 UUID
pub fn random_name() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("tf-{}", &uuid[..8])
}

fn copy_id_from_source(def: &ResourceDef, record: &mut Record) {
    if let Some(source) = &def.id_from {
        if let Some(id) = record.int(source) {
            record.set("id", id);
        }
    }
}

/// Combine the planned record with prior state for an Update.
///
/// The id and computed fields always come from `prior`. Omitted fields that
/// were filled on Create (defaults, generated values, lookups) or that can
/// never change are carried over. An immutable field set to a different
/// value than before is rejected, and so is a write-only immutable field
/// that prior state does not hold.
pub(crate) fn merge_planned(def: &ResourceDef, prior: &Record, planned: Record) -> Result<Record, ApiError> {
    let id = prior.id().ok_or(ApiError::MissingId)?;
    let mut record = planned;

    for field in def.computed_fields() {
        match prior.get(&field.name) {
            Some(value) => record.set(&field.name, value.clone()),
            None => {
                record.unset(&field.name);
            }
        }
    }

    for field in def.input_fields() {
        match (record.get(&field.name), prior.get(&field.name)) {
            (Some(new), Some(old)) if field.immutable && new != old => {
                return Err(ApiError::ImmutableField {
                    field: field.name.clone(),
                });
            }
            // A write-only value missing from prior cannot be compared
            (Some(_), None) if field.immutable && field.write_only => {
                return Err(ApiError::ImmutableField {
                    field: field.name.clone(),
                });
            }
            (None, Some(old)) => {
                let carried = field.immutable
                    || field.default.is_some()
                    || field.generate.is_some()
                    || field.provider_default.is_some()
                    || field.lookup.is_some();
                if carried {
                    record.set(&field.name, old.clone());
                }
            }
            _ => {}
        }
    }

    record.set("id", id);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind() {
        assert!(matches!(ResourceAdapter::new("volume"), Err(ApiError::UnknownKind(_))));
    }

    #[tokio::test]
    async fn test_calls_before_configure_fail() {
        let adapter = ResourceAdapter::new("ssh_key").unwrap();
        let err = adapter.read(Record::with_id(1)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotConfigured(kind) if kind == "ssh_key"));
    }

    #[test]
    fn test_random_name_shape() {
        let name = random_name();
        assert_eq!(name.len(), 11);
        assert!(name.starts_with("tf-"));
        assert!(name[3..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(random_name(), random_name());
    }

    #[test]
    fn test_fill_defaults() {
        let def = get_resource("server").unwrap();
        let defaults = ProviderDefaults {
            package_id: Some(4),
            public_ipv4: Some(1),
            private_ipv4: Some(0),
            hypervisor_group_id: Some(2),
            ..Default::default()
        };
        let mut record = Record::new().with("user_id", 9).with("ipv4", 3);
        fill_defaults(def, &mut record, &defaults);

        assert_eq!(record.int("package_id"), Some(4));
        assert_eq!(record.int("hypervisor_id"), Some(2));
        assert_eq!(record.int("ipv4"), Some(3));
        assert_eq!(record.int("private_ipv4"), Some(0));
        assert!(record.str("name").unwrap().starts_with("tf-"));
        assert!(!record.contains("memory"));
    }

    #[test]
    fn test_merge_rejects_immutable_change() {
        let def = get_resource("server").unwrap();
        let prior = Record::with_id(3).with("package_id", 1).with("name", "web");
        let planned = Record::new().with("package_id", 2).with("name", "web");
        let err = merge_planned(def, &prior, planned).unwrap_err();
        assert!(matches!(err, ApiError::ImmutableField { field } if field == "package_id"));
    }

    #[test]
    fn test_merge_carries_id_computed_and_generated() {
        let def = get_resource("server").unwrap();
        let prior = Record::with_id(3)
            .with("uuid", "u-3")
            .with("name", "tf-0a1b2c3d")
            .with("package_id", 1)
            .with("memory", 1024);
        let planned = Record::new().with("memory", 2048).with("uuid", "bogus");
        let merged = merge_planned(def, &prior, planned).unwrap();

        assert_eq!(merged.id(), Some(3));
        assert_eq!(merged.str("uuid"), Some("u-3"));
        assert_eq!(merged.str("name"), Some("tf-0a1b2c3d"));
        assert_eq!(merged.int("package_id"), Some(1));
        assert_eq!(merged.int("memory"), Some(2048));
    }

    #[test]
    fn test_merge_rejects_unverifiable_write_only_input() {
        let def = get_resource("ssh_key").unwrap();
        let prior = Record::with_id(8).with("user_id", 1).with("name", "laptop");
        let planned = Record::new()
            .with("user_id", 1)
            .with("name", "laptop")
            .with("public_key", "ssh-ed25519 AAAA");
        let err = merge_planned(def, &prior, planned).unwrap_err();
        assert!(matches!(err, ApiError::ImmutableField { field } if field == "public_key"));
    }

    #[test]
    fn test_merge_rejects_build_os_change() {
        let def = get_resource("server_build").unwrap();
        let prior = Record::with_id(12).with("server_id", 12).with("name", "web").with("osid", 5);
        let planned = Record::new().with("server_id", 12).with("name", "web").with("osid", 99);
        let err = merge_planned(def, &prior, planned).unwrap_err();
        assert!(matches!(err, ApiError::ImmutableField { field } if field == "osid"));
    }

    #[test]
    fn test_merge_requires_prior_id() {
        let def = get_resource("package").unwrap();
        assert!(matches!(
            merge_planned(def, &Record::new(), Record::new()),
            Err(ApiError::MissingId)
        ));
    }
}
