//! Resource abstraction layer
//!
//! Every resource kind is handled by one generic adapter parameterised by a
//! field table. Definitions are loaded from JSON files at compile time, so a
//! new kind is a JSON change.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches resource definitions from embedded JSON
//! - [`record`] - Typed field values and the record that holds them
//! - [`codec`] - Maps records to request bodies and responses back to records
//! - [`lookup`] - Resolves names to ids before Create
//! - [`adapter`] - The CRUD lifecycle over the REST API
//! - [`data_source`] - Read-only lookups by id
//!
//! # Resource Definitions
//!
//! Resources are defined in JSON files under `src/resources/`:
//! - `servers.json` - servers, server builds and the server data source
//! - `ssh_keys.json` - SSH keys
//! - `packages.json` - packages
//! - `network_blocks.json` - network blocks
//!
//! # Example
//!
//! ```ignore
//! use virtfusion_provider::resource::{Record, Resource, ResourceAdapter};
//!
//! async fn add_key(data: Arc<ProviderData>) -> Result<Record, ApiError> {
//!     let mut keys = ResourceAdapter::new("ssh_key")?;
//!     keys.configure(data);
//!     keys.create(
//!         Record::new()
//!             .with("user_id", 1)
//!             .with("name", "laptop")
//!             .with("public_key", "ssh-ed25519 AAAA..."),
//!     )
//!     .await
//! }
//! ```

pub mod adapter;
pub mod codec;
pub mod data_source;
pub mod lookup;
pub mod record;
pub mod registry;

pub use adapter::{Resource, ResourceAdapter};
pub use data_source::{DataSource, DataSourceAdapter};
pub use record::{FieldValue, Record};
pub use registry::{get_all_data_source_keys, get_all_resource_keys, get_data_source, get_resource, ResourceDef};
