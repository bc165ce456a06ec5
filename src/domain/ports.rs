use crate::domain::model::{
    Cursor, FormattedRecord, Integration, LocalId, Page, ProjectId, SourceProjectKey,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Feature gate lookup.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    async fn is_enabled(&self, feature: &str, project: &ProjectId) -> Result<bool>;
}

#[async_trait]
pub trait IntegrationLookup: Send + Sync {
    async fn active_integration(&self, project: &ProjectId) -> Result<Option<Integration>>;
}

#[async_trait]
pub trait ImportConfigStore: Send + Sync {
    async fn current_source_project_key(
        &self,
        project: &ProjectId,
    ) -> Result<Option<SourceProjectKey>>;
}

pub struct PageRequest<'a> {
    pub collection: &'a str,
    pub source_project: &'a SourceProjectKey,
    pub cursor: Option<&'a Cursor>,
    pub page_size: usize,
}

#[async_trait]
pub trait ExternalClient: Send + Sync {
    async fn fetch_page(&self, request: PageRequest<'_>) -> Result<Page>;
}

/// Builds a client bound to an integration's stored credentials.
pub trait ClientFactory: Send + Sync {
    fn build(&self, integration: &Integration) -> Result<Arc<dyn ExternalClient>>;
}

/// Persists one formatted record. Calling it twice with the same
/// `external_id` must not create a second local record.
#[async_trait]
pub trait RecordWriter: Send + Sync {
    async fn apply_record(&self, project: &ProjectId, record: &FormattedRecord)
        -> Result<LocalId>;
}

/// Namespaced set and value store with expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> Result<()>;
    async fn set_includes(&self, key: &str, member: &str) -> Result<bool>;
    async fn write(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    async fn read(&self, key: &str) -> Result<Option<String>>;
    async fn expire(&self, key: &str) -> Result<()>;
}
