//! Resource Registry - Load resource definitions from JSON
//!
//! Every resource kind and data source is described by a field table in an
//! embedded JSON file. The adapter is generic over these tables; adding a kind
//! means adding JSON, not code.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/servers.json"),
    include_str!("../resources/ssh_keys.json"),
    include_str!("../resources/packages.json"),
    include_str!("../resources/network_blocks.json"),
];

/// Value type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Int,
    String,
    Bool,
    IntList,
}

impl FieldType {
    pub fn describe(self) -> &'static str {
        match self {
            FieldType::Int => "an integer",
            FieldType::String => "a string",
            FieldType::Bool => "a boolean",
            FieldType::IntList => "a list of integers",
        }
    }
}

/// Who supplies a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    Required,
    Optional,
    Computed,
}

/// Generated value for an omitted input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Generator {
    /// `tf-` followed by 8 hex chars
    RandomName,
}

/// Auxiliary name -> id resolution performed before Create
#[derive(Debug, Clone, Deserialize)]
pub struct LookupDef {
    /// Collection listed to find the entry
    pub collection: String,
    /// Record field holding the name to look up
    pub source: String,
    /// Provider default consulted when `source` is unset
    #[serde(default)]
    pub provider_default: Option<String>,
    #[serde(default = "default_response_path")]
    pub response_path: String,
    #[serde(default = "default_match_key")]
    pub match_key: String,
    #[serde(default = "default_id_key")]
    pub id_key: String,
}

/// Field definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub role: FieldRole,
    /// Request body key, defaults to `name`
    #[serde(default)]
    pub json: Option<String>,
    /// Response key (dot path allowed), defaults to the request key
    #[serde(default)]
    pub read_json: Option<String>,
    /// Further response keys tried in order when `read_json` is absent
    #[serde(default)]
    pub read_alias: Vec<String>,
    #[serde(default)]
    pub immutable: bool,
    /// Sent on create, never read back
    #[serde(default)]
    pub write_only: bool,
    /// Substituted into the endpoint path instead of the body
    #[serde(default)]
    pub in_path: bool,
    /// Never sent; only feeds lookups
    #[serde(default)]
    pub local: bool,
    /// Schema default shown in state when the field stays unset
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub provider_default: Option<String>,
    #[serde(default)]
    pub generate: Option<Generator>,
    #[serde(default)]
    pub lookup: Option<LookupDef>,
    #[serde(default)]
    pub description: String,
}

impl FieldDef {
    pub fn request_key(&self) -> &str {
        self.json.as_deref().unwrap_or(&self.name)
    }

    pub fn response_key(&self) -> &str {
        self.read_json.as_deref().unwrap_or_else(|| self.request_key())
    }

    pub fn is_input(&self) -> bool {
        self.role != FieldRole::Computed
    }

    /// Response keys to try, primary first
    pub fn response_keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.response_key()).chain(self.read_alias.iter().map(String::as_str))
    }

    /// Whether this field can appear in a request body
    pub fn is_sent(&self) -> bool {
        self.is_input() && !self.in_path && !self.local
    }

    /// Whether this field is refreshed from response bodies
    pub fn is_read_back(&self) -> bool {
        !self.write_only && !self.in_path && !self.local
    }
}

/// HTTP method used for Update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMethod {
    Put,
    Patch,
}

impl UpdateMethod {
    pub fn as_method(self) -> reqwest::Method {
        match self {
            UpdateMethod::Put => reqwest::Method::PUT,
            UpdateMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    /// Collection path; may reference `{field}` placeholders
    pub collection: String,
    /// Single-object path, defaults to `{collection}/{id}`
    #[serde(default)]
    pub item_path: Option<String>,
    /// Envelope key of single-object responses
    #[serde(default = "default_response_path")]
    pub response_path: String,
    /// Input field the id is copied from when the remote response has none
    #[serde(default)]
    pub id_from: Option<String>,
    #[serde(default = "default_create_status")]
    pub create_status: Vec<u16>,
    /// `None` makes Update a no-op
    #[serde(default)]
    pub update_method: Option<UpdateMethod>,
    /// `false` makes Delete a state-only removal
    #[serde(default = "default_true")]
    pub remote_delete: bool,
    pub fields: Vec<FieldDef>,
}

impl ResourceDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn item_path(&self) -> String {
        self.item_path
            .clone()
            .unwrap_or_else(|| format!("{}/{{id}}", self.collection))
    }

    pub fn computed_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.is_input())
    }

    pub fn input_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_input())
    }
}

fn default_response_path() -> String {
    "data".to_string()
}

fn default_match_key() -> String {
    "name".to_string()
}

fn default_id_key() -> String {
    "id".to_string()
}

fn default_create_status() -> Vec<u16> {
    vec![200, 201]
}

fn default_true() -> bool {
    true
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceDef>,
    #[serde(default)]
    pub data_sources: HashMap<String, ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
            data_sources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
            final_config.data_sources.extend(partial.data_sources);
        }

        final_config
    })
}

/// Get a resource definition by key
pub fn get_resource(key: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(key)
}

/// Get a data source definition by key
pub fn get_data_source(key: &str) -> Option<&'static ResourceDef> {
    get_registry().data_sources.get(key)
}

/// Get all resource keys, sorted
pub fn get_all_resource_keys() -> Vec<&'static str> {
    let mut keys: Vec<&str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    keys.sort_unstable();
    keys
}

/// Get all data source keys, sorted
pub fn get_all_data_source_keys() -> Vec<&'static str> {
    let mut keys: Vec<&str> = get_registry()
        .data_sources
        .keys()
        .map(|s| s.as_str())
        .collect();
    keys.sort_unstable();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_loads_successfully() {
        let registry = get_registry();
        assert!(
            !registry.resources.is_empty(),
            "Registry should have resources"
        );
    }

    #[test]
    fn test_all_resource_kinds_exist() {
        let keys = get_all_resource_keys();
        assert_eq!(
            keys,
            vec!["network_block", "package", "server", "server_build", "ssh_key"]
        );
        assert_eq!(get_all_data_source_keys(), vec!["server"]);
    }

    #[test]
    fn test_package_disk_type_is_optional_string() {
        let disk_type = get_resource("package").unwrap().field("disk_type").unwrap();
        assert_eq!(disk_type.field_type, FieldType::String);
        assert_eq!(disk_type.role, FieldRole::Optional);
        assert!(!disk_type.immutable);
    }

    #[test]
    fn test_every_kind_has_integer_id() {
        let registry = get_registry();
        for (key, def) in registry.resources.iter().chain(registry.data_sources.iter()) {
            let id = def.field("id").unwrap_or_else(|| panic!("{} has no id field", key));
            assert_eq!(id.field_type, FieldType::Int, "{} id must be an integer", key);
        }
    }

    #[test]
    fn test_resource_ids_are_computed() {
        for key in get_all_resource_keys() {
            let def = get_resource(key).unwrap();
            assert_eq!(def.field("id").unwrap().role, FieldRole::Computed, "{}", key);
        }
    }

    #[test]
    fn test_defaults_match_field_types() {
        let registry = get_registry();
        for (key, def) in registry.resources.iter().chain(registry.data_sources.iter()) {
            for field in &def.fields {
                if let Some(default) = &field.default {
                    assert!(
                        crate::resource::record::FieldValue::from_json(field.field_type, default).is_some(),
                        "{}.{} default does not match its type",
                        key,
                        field.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_lookup_sources_exist() {
        let registry = get_registry();
        for (key, def) in &registry.resources {
            for field in &def.fields {
                if let Some(lookup) = &field.lookup {
                    assert!(def.field(&lookup.source).is_some(), "{}.{} lookup source missing", key, field.name);
                }
            }
        }
    }

    #[test]
    fn test_item_path_defaults_to_collection_id() {
        let ssh = get_resource("ssh_key").unwrap();
        assert_eq!(ssh.item_path(), "ssh_keys/{id}");

        let build = get_resource("server_build").unwrap();
        assert_eq!(build.item_path(), "servers/{id}");
        assert_eq!(build.collection, "servers/{server_id}/build");
    }

    #[test]
    fn test_ssh_key_fields_are_immutable() {
        let ssh = get_resource("ssh_key").unwrap();
        assert!(ssh.update_method.is_none());
        assert!(ssh.input_fields().all(|f| f.immutable));
        assert!(ssh.field("public_key").unwrap().write_only);
    }
}
