use crate::core::context::{ImportContext, ImportServices};
use crate::core::importer::{CancellationFlag, KindImporter, RunSettings};
use crate::core::kind::KindRegistry;
use crate::core::tracker::DedupTracker;
use crate::domain::model::{JobReport, ProjectId};
use crate::domain::ports::RecordWriter;
use crate::utils::error::{ImportError, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// In-process exclusion so one (project, kind) never runs twice at once.
#[derive(Clone, Default)]
pub struct RunLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, project: &ProjectId, kind: &str) -> Result<RunGuard> {
        let key = format!("{}/{}", project, kind);
        let mut held = self.held.lock().map_err(|_| ImportError::Cache {
            message: "run lock poisoned".to_string(),
        })?;
        if !held.insert(key.clone()) {
            return Err(ImportError::RunInProgress {
                project: project.to_string(),
                kind: kind.to_string(),
            });
        }
        Ok(RunGuard {
            held: self.held.clone(),
            key,
        })
    }
}

pub struct RunGuard {
    held: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.key);
        }
    }
}

/// Sequences kind importers for a project and collects their results.
pub struct ImportJob {
    services: ImportServices,
    registry: KindRegistry,
    tracker: DedupTracker,
    writer: Arc<dyn RecordWriter>,
    settings: RunSettings,
    locks: RunLocks,
}

impl ImportJob {
    pub fn new(
        services: ImportServices,
        registry: KindRegistry,
        tracker: DedupTracker,
        writer: Arc<dyn RecordWriter>,
        settings: RunSettings,
    ) -> Self {
        Self {
            services,
            registry,
            tracker,
            writer,
            settings,
            locks: RunLocks::new(),
        }
    }

    pub fn with_locks(mut self, locks: RunLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Configuration problems and a busy (project, kind) surface as errors
    /// before anything is fetched.
    /// Failures during a run are reported in the returned [`JobReport`].
    pub async fn run(
        &self,
        project: ProjectId,
        kinds: &[String],
        cancel: &CancellationFlag,
    ) -> Result<JobReport> {
        let selected = self.registry.resolve(kinds)?;
        // Every selected kind is locked before the first one runs.
        let _guards = selected
            .iter()
            .map(|kind| self.locks.acquire(&project, kind.name()))
            .collect::<Result<Vec<_>>>()?;
        let context = ImportContext::build(project, &self.services).await?;

        let mut report = JobReport {
            project: context.project().clone(),
            source_project: context.source_project().clone(),
            runs: Vec::with_capacity(selected.len()),
        };

        for kind in selected {
            if cancel.is_cancelled() {
                tracing::info!("Job cancelled before {}", kind.name());
                break;
            }

            let importer = KindImporter::new(
                context.clone(),
                kind,
                self.tracker.clone(),
                self.writer.clone(),
                self.settings.clone(),
            );
            report.runs.push(importer.run(cancel).await);
        }

        tracing::info!(
            "Import job for project {} finished: {:?}, {} records applied",
            report.project,
            report.status(),
            report.total_applied()
        );
        Ok(report)
    }
}
