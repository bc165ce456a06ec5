// Application layer: wires adapters from a loaded configuration.

use crate::adapters::{FileCache, HttpClientFactory, JsonLinesWriter, MemoryCache};
use crate::config::{CacheBackendKind, ImportConfig};
use crate::core::context::ImportServices;
use crate::core::importer::CancellationFlag;
use crate::core::job::ImportJob;
use crate::core::kind::KindRegistry;
use crate::core::tracker::DedupTracker;
use crate::domain::model::JobReport;
use crate::domain::ports::CacheBackend;
use crate::utils::error::Result;
use std::sync::Arc;

pub fn cache_backend(config: &ImportConfig) -> Result<Arc<dyn CacheBackend>> {
    Ok(match config.cache.backend {
        CacheBackendKind::Memory => {
            tracing::warn!("Using in-memory cache; a restarted import will not resume");
            Arc::new(MemoryCache::new())
        }
        CacheBackendKind::File => Arc::new(FileCache::open(config.cache_path())?),
    })
}

pub fn build_job(config: Arc<ImportConfig>) -> Result<ImportJob> {
    let services = ImportServices {
        capabilities: config.clone(),
        integrations: config.clone(),
        import_config: config.clone(),
        clients: Arc::new(HttpClientFactory::new(config.client_timeout())),
    };
    let tracker = DedupTracker::with_ttl(cache_backend(&config)?, config.cache_ttl());
    let writer = Arc::new(JsonLinesWriter::new(&config.output.path));

    Ok(ImportJob::new(
        services,
        KindRegistry::with_defaults(),
        tracker,
        writer,
        config.run_settings(),
    ))
}

/// Runs the configured job once. `kinds` overrides the configured kinds
/// when non-empty.
pub async fn run_import(
    config: Arc<ImportConfig>,
    kinds: &[String],
    cancel: &CancellationFlag,
) -> Result<JobReport> {
    let kinds = if kinds.is_empty() {
        config.kinds()
    } else {
        kinds.to_vec()
    };
    let job = build_job(config.clone())?;
    job.run(config.project_id(), &kinds, cancel).await
}
