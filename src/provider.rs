//! Provider
//!
//! Configure builds the authenticated client once; every adapter handed out
//! afterwards shares it read-only.

use std::sync::Arc;

use crate::config::{ProviderDefaults, ResolvedConfig};
use crate::resource::{DataSource, DataSourceAdapter, Resource, ResourceAdapter};
use crate::virtfusion::{ApiError, VirtFusionClient};

/// Shared state produced by Configure
#[derive(Debug)]
pub struct ProviderData {
    pub client: VirtFusionClient,
    pub defaults: ProviderDefaults,
}

/// Configured VirtFusion provider
#[derive(Debug, Clone)]
pub struct Provider {
    data: Arc<ProviderData>,
}

impl Provider {
    pub fn configure(config: &ResolvedConfig) -> Result<Self, ApiError> {
        let client = VirtFusionClient::new(&config.endpoint, config.credentials.clone(), config.timeout)?;
        tracing::debug!("Configured provider for {}", client.base_url());

        Ok(Self::from_data(ProviderData {
            client,
            defaults: config.defaults.clone(),
        }))
    }

    pub fn from_data(data: ProviderData) -> Self {
        Self { data: Arc::new(data) }
    }

    pub fn data(&self) -> Arc<ProviderData> {
        Arc::clone(&self.data)
    }

    /// Configured adapter for a resource kind
    pub fn resource(&self, kind: &str) -> Result<ResourceAdapter, ApiError> {
        let mut adapter = ResourceAdapter::new(kind)?;
        adapter.configure(self.data());
        Ok(adapter)
    }

    /// Configured adapter for a data source kind
    pub fn data_source(&self, kind: &str) -> Result<DataSourceAdapter, ApiError> {
        let mut adapter = DataSourceAdapter::new(kind)?;
        adapter.configure(self.data());
        Ok(adapter)
    }
}
