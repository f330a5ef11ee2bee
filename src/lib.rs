//! VirtFusion provider
//!
//! Typed CRUD adapters over the VirtFusion control panel REST API, shaped
//! like an infrastructure-as-code provider: configure once, then create,
//! read, update, delete and import records of each resource kind.

pub mod config;
pub mod provider;
pub mod resource;
pub mod state;
pub mod virtfusion;

pub use config::{Config, ConfigError, ProviderDefaults, ResolvedConfig};
pub use provider::{Provider, ProviderData};
pub use resource::{DataSource, DataSourceAdapter, FieldValue, Record, Resource, ResourceAdapter};
pub use virtfusion::{ApiError, VirtFusionClient};
