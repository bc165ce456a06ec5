use crate::core::context::ImportContext;
use crate::domain::model::{Cursor, ExternalRecord, FormattedRecord, Page};
use crate::utils::error::{ConfigurationError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// What happens to a record that cannot be formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Mark it imported so later runs never look at it again.
    MarkAndSkip,
    /// Leave it unmarked and count it as failed; every run retries it.
    RetryLater,
}

/// One importable entity type. Implementations own the record shape; the
/// runner owns dedup, ordering and error accounting.
#[async_trait]
pub trait ImportKind: Send + Sync {
    fn name(&self) -> &'static str;

    /// Namespace of the dedup set for this kind.
    fn cache_namespace(&self) -> &'static str;

    fn malformed_policy(&self) -> MalformedPolicy;

    async fn fetch_page(
        &self,
        context: &ImportContext,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page>;

    fn format(&self, context: &ImportContext, record: &ExternalRecord) -> Result<FormattedRecord>;
}

/// The kinds a job may run, in registration order.
#[derive(Clone, Default)]
pub struct KindRegistry {
    kinds: Vec<Arc<dyn ImportKind>>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels come first so issue labels already exist locally.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::kinds::labels::LabelsKind));
        registry.register(Arc::new(crate::kinds::issues::IssuesKind));
        registry
    }

    pub fn register(&mut self, kind: Arc<dyn ImportKind>) {
        self.kinds.retain(|existing| existing.name() != kind.name());
        self.kinds.push(kind);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ImportKind>> {
        self.kinds.iter().find(|k| k.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.kinds.iter().map(|k| k.name()).collect()
    }

    /// Resolves requested names, keeping registration order. An empty
    /// request selects every registered kind.
    pub fn resolve(&self, requested: &[String]) -> Result<Vec<Arc<dyn ImportKind>>> {
        if requested.is_empty() {
            return Ok(self.kinds.clone());
        }

        if let Some(unknown) = requested.iter().find(|name| self.get(name).is_none()) {
            return Err(ConfigurationError::UnknownKind(unknown.clone()).into());
        }

        Ok(self
            .kinds
            .iter()
            .filter(|k| requested.iter().any(|name| name == k.name()))
            .cloned()
            .collect())
    }
}
