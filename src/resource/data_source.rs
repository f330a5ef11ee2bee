//! Read-only data sources

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::codec::{decode_into, render_path, unwrap_envelope};
use super::record::Record;
use super::registry::{get_data_source, ResourceDef};
use crate::provider::ProviderData;
use crate::virtfusion::ApiError;

#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &str;

    fn configure(&mut self, data: Arc<ProviderData>);

    /// Look up the remote object named by `config`. Absence is an error.
    async fn read(&self, config: Record) -> Result<Record, ApiError>;
}

/// Data source driven by a [`ResourceDef`] field table
#[derive(Debug, Clone)]
pub struct DataSourceAdapter {
    key: String,
    def: &'static ResourceDef,
    data: Option<Arc<ProviderData>>,
}

impl DataSourceAdapter {
    pub fn new(key: &str) -> Result<Self, ApiError> {
        let def = get_data_source(key).ok_or_else(|| ApiError::UnknownKind(key.to_string()))?;
        Ok(Self {
            key: key.to_string(),
            def,
            data: None,
        })
    }
}

#[async_trait]
impl DataSource for DataSourceAdapter {
    fn type_name(&self) -> &str {
        &self.key
    }

    fn configure(&mut self, data: Arc<ProviderData>) {
        self.data = Some(data);
    }

    async fn read(&self, config: Record) -> Result<Record, ApiError> {
        let data = self
            .data
            .as_deref()
            .ok_or_else(|| ApiError::NotConfigured(self.key.clone()))?;
        let def = self.def;

        let id = config.id().ok_or(ApiError::MissingId)?;
        let mut record = Record::with_id(id);
        let path = render_path(&def.item_path(), &record)?;

        let response = data.client.get(&path).await?;
        if response.status == 404 {
            return Err(ApiError::NotFound { path });
        }
        if !response.is_success() {
            return Err(ApiError::unexpected(response.status, &response.body));
        }

        let json = response.json()?;
        let object = unwrap_envelope(&json, &def.response_path)
            .ok_or_else(|| ApiError::MalformedResponse(format!("{} body is not an object", path)))?;
        decode_into(def, &mut record, object)?;

        debug!("Read {} {} with {} fields", def.display_name, id, record.len());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_server_data_source_exists() {
        assert!(DataSourceAdapter::new("server").is_ok());
        assert!(matches!(DataSourceAdapter::new("ssh_key"), Err(ApiError::UnknownKind(_))));
    }

    #[tokio::test]
    async fn test_read_before_configure_fails() {
        let adapter = DataSourceAdapter::new("server").unwrap();
        let err = adapter.read(Record::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotConfigured(_)));
    }
}
