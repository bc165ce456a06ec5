use crate::domain::model::ProjectId;
use crate::domain::ports::CacheBackend;
use crate::utils::error::Result;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

const KEY_PREFIX: &str = "tracker-import";

pub fn already_imported_key(project: &ProjectId, namespace: &str) -> String {
    format!("{}/already-imported/{}/{}", KEY_PREFIX, project, namespace)
}

pub fn checkpoint_key(project: &ProjectId, namespace: &str) -> String {
    format!("{}/paginator/{}/{}", KEY_PREFIX, project, namespace)
}

/// Set membership of external ids already applied, stored in the cache
/// backend so it outlives the process.
#[derive(Clone)]
pub struct DedupTracker {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl DedupTracker {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self::with_ttl(backend, DEFAULT_TTL)
    }

    pub fn with_ttl(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn mark(&self, key: &str, external_id: &str) -> Result<()> {
        self.backend.set_add(key, external_id, self.ttl).await
    }

    pub async fn is_marked(&self, key: &str, external_id: &str) -> Result<bool> {
        self.backend.set_includes(key, external_id).await
    }

    pub fn bind(&self, key: String) -> ImportedItems {
        ImportedItems {
            tracker: self.clone(),
            key,
        }
    }

    pub(crate) fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }
}

/// A tracker view with the key of one (project, kind) already applied.
#[derive(Clone)]
pub struct ImportedItems {
    tracker: DedupTracker,
    key: String,
}

impl ImportedItems {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn mark_imported(&self, external_id: &str) -> Result<()> {
        self.tracker.mark(&self.key, external_id).await
    }

    pub async fn already_imported(&self, external_id: &str) -> Result<bool> {
        self.tracker.is_marked(&self.key, external_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_cache::MemoryCache;

    #[test]
    fn test_key_layout() {
        let project = ProjectId(42);
        assert_eq!(
            already_imported_key(&project, "issues"),
            "tracker-import/already-imported/42/issues"
        );
        assert_eq!(
            checkpoint_key(&project, "labels"),
            "tracker-import/paginator/42/labels"
        );
    }

    #[tokio::test]
    async fn test_mark_is_idempotent() {
        let tracker = DedupTracker::new(Arc::new(MemoryCache::new()));
        let key = already_imported_key(&ProjectId(1), "issues");

        assert!(!tracker.is_marked(&key, "10001").await.unwrap());
        tracker.mark(&key, "10001").await.unwrap();
        tracker.mark(&key, "10001").await.unwrap();
        assert!(tracker.is_marked(&key, "10001").await.unwrap());
    }

    #[tokio::test]
    async fn test_namespaces_are_disjoint() {
        let tracker = DedupTracker::new(Arc::new(MemoryCache::new()));
        let issues = tracker.bind(already_imported_key(&ProjectId(1), "issues"));
        let labels = tracker.bind(already_imported_key(&ProjectId(1), "labels"));
        let other_project = tracker.bind(already_imported_key(&ProjectId(2), "issues"));

        issues.mark_imported("7").await.unwrap();

        assert!(issues.already_imported("7").await.unwrap());
        assert!(!labels.already_imported("7").await.unwrap());
        assert!(!other_project.already_imported("7").await.unwrap());
    }
}
