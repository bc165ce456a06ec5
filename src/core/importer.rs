use crate::core::context::ImportContext;
use crate::core::kind::{ImportKind, MalformedPolicy};
use crate::core::tracker::{already_imported_key, checkpoint_key, DedupTracker, ImportedItems};
use crate::domain::model::{Cursor, ExternalRecord, Page, RunResult, RunStatus};
use crate::domain::ports::RecordWriter;
use crate::utils::error::{ErrorSeverity, ImportError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub page_size: usize,
    pub fetch_retries: u32,
    pub retry_delay: Duration,
    pub resume_from_checkpoint: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            fetch_retries: 3,
            retry_delay: Duration::from_secs(2),
            resume_from_checkpoint: true,
        }
    }
}

/// Cooperative stop signal, checked before each record.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

enum LoopEnd {
    Exhausted,
    Cancelled,
    FetchFailed(ImportError),
}

/// Drives one kind through its pages for one project.
pub struct KindImporter {
    context: ImportContext,
    kind: Arc<dyn ImportKind>,
    tracker: DedupTracker,
    imported: ImportedItems,
    writer: Arc<dyn RecordWriter>,
    settings: RunSettings,
}

impl KindImporter {
    pub fn new(
        context: ImportContext,
        kind: Arc<dyn ImportKind>,
        tracker: DedupTracker,
        writer: Arc<dyn RecordWriter>,
        settings: RunSettings,
    ) -> Self {
        let imported = tracker.bind(already_imported_key(
            context.project(),
            kind.cache_namespace(),
        ));
        Self {
            context,
            kind,
            tracker,
            imported,
            writer,
            settings,
        }
    }

    pub fn cache_key(&self) -> &str {
        self.imported.key()
    }

    pub async fn mark_imported(&self, external_id: &str) -> Result<()> {
        self.imported.mark_imported(external_id).await
    }

    pub async fn already_imported(&self, external_id: &str) -> Result<bool> {
        self.imported.already_imported(external_id).await
    }

    fn checkpoint_key(&self) -> String {
        checkpoint_key(self.context.project(), self.kind.cache_namespace())
    }

    /// Runs until the feed is exhausted, the run is cancelled, or a failure
    /// breaks the fetch loop. Errors never escape; they land in the result.
    pub async fn run(&self, cancel: &CancellationFlag) -> RunResult {
        let started = Instant::now();
        let mut result = RunResult::new(self.kind.name());

        let mut cursor = if self.settings.resume_from_checkpoint {
            self.load_checkpoint().await
        } else {
            None
        };

        tracing::info!(
            "Importing {} for project {} from {}{}",
            self.kind.name(),
            self.context.project(),
            self.context.source_project(),
            if cursor.is_some() { " (resuming)" } else { "" }
        );

        let status = match self.drive(&mut cursor, &mut result, cancel).await {
            Ok(LoopEnd::Exhausted) => {
                self.clear_checkpoint().await;
                if result.failed > 0 {
                    RunStatus::PartiallyFailed
                } else {
                    RunStatus::Succeeded
                }
            }
            Ok(LoopEnd::Cancelled) => {
                tracing::warn!("Import of {} cancelled", self.kind.name());
                RunStatus::Cancelled
            }
            Ok(LoopEnd::FetchFailed(err)) => {
                tracing::warn!(
                    "Stopping {} import at last page boundary: {}",
                    self.kind.name(),
                    err
                );
                result.record_failure(&err);
                RunStatus::PartiallyFailed
            }
            Err(err) => {
                tracing::error!("Import of {} aborted: {}", self.kind.name(), err);
                result.last_error = Some(err.to_string());
                RunStatus::Aborted
            }
        };
        result.status = status;
        result.duration = started.elapsed();

        tracing::info!(
            "Finished {}: {:?}, applied {}, skipped {}, discarded {}, failed {}",
            self.kind.name(),
            result.status,
            result.applied,
            result.skipped,
            result.discarded,
            result.failed
        );
        result
    }

    async fn drive(
        &self,
        cursor: &mut Option<Cursor>,
        result: &mut RunResult,
        cancel: &CancellationFlag,
    ) -> Result<LoopEnd> {
        // Set once a page leaves a record unmarked. The stored checkpoint
        // then stays at the boundary before that page.
        let mut hold_checkpoint = false;
        loop {
            if cancel.is_cancelled() {
                return Ok(LoopEnd::Cancelled);
            }

            let page = match self.fetch_with_retry(cursor.as_ref()).await {
                Ok(page) => page,
                Err(err) if err.is_transient() => return Ok(LoopEnd::FetchFailed(err)),
                Err(err) => return Err(err),
            };
            result.pages += 1;
            tracing::debug!(
                "Fetched page {} of {} with {} records",
                result.pages,
                self.kind.name(),
                page.records.len()
            );

            let failed_before = result.failed;
            for record in &page.records {
                if cancel.is_cancelled() {
                    return Ok(LoopEnd::Cancelled);
                }
                self.process_record(record, result).await?;
            }
            if result.failed > failed_before && !hold_checkpoint {
                tracing::debug!(
                    "Holding {} checkpoint: page {} left records unimported",
                    self.kind.name(),
                    result.pages
                );
                hold_checkpoint = true;
            }

            match page.next_cursor {
                Some(next) => {
                    if cursor.as_ref() == Some(&next) {
                        return Err(ImportError::FetchRejected {
                            message: format!("cursor {} did not advance", next.0),
                        });
                    }
                    if !hold_checkpoint {
                        self.save_checkpoint(&next).await;
                    }
                    *cursor = Some(next);
                }
                None => return Ok(LoopEnd::Exhausted),
            }
        }
    }

    async fn fetch_with_retry(&self, cursor: Option<&Cursor>) -> Result<Page> {
        let mut attempt = 0;
        loop {
            match self
                .kind
                .fetch_page(&self.context, cursor, self.settings.page_size)
                .await
            {
                Ok(page) => return Ok(page),
                Err(err) if err.is_transient() && attempt < self.settings.fetch_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Fetch of {} failed (attempt {}/{}): {}",
                        self.kind.name(),
                        attempt,
                        self.settings.fetch_retries,
                        err
                    );
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Check, apply, then mark. A record is only marked once the writer has
    /// accepted it, or when its kind discards malformed records.
    async fn process_record(&self, record: &ExternalRecord, result: &mut RunResult) -> Result<()> {
        if self.already_imported(&record.id).await? {
            tracing::debug!("Skipping {} {}: already imported", self.kind.name(), record.id);
            result.skipped += 1;
            return Ok(());
        }

        let formatted = match self.kind.format(&self.context, record) {
            Ok(formatted) => formatted,
            Err(err @ ImportError::MalformedRecord { .. }) => {
                match self.kind.malformed_policy() {
                    MalformedPolicy::MarkAndSkip => {
                        tracing::warn!("Discarding {}", err);
                        self.mark_imported(&record.id).await?;
                        result.discarded += 1;
                    }
                    MalformedPolicy::RetryLater => {
                        tracing::warn!("Leaving unimported: {}", err);
                        result.record_failure(&err);
                    }
                }
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        match self
            .writer
            .apply_record(self.context.project(), &formatted)
            .await
        {
            Ok(local_id) => {
                self.mark_imported(&record.id).await?;
                result.applied += 1;
                tracing::debug!(
                    "Applied {} {} as local {}",
                    self.kind.name(),
                    record.id,
                    local_id.0
                );
                Ok(())
            }
            Err(err) if err.severity() == ErrorSeverity::Critical => Err(err),
            Err(err) => {
                tracing::warn!("Failed to apply {} {}: {}", self.kind.name(), record.id, err);
                result.record_failure(&err);
                Ok(())
            }
        }
    }

    async fn load_checkpoint(&self) -> Option<Cursor> {
        match self.tracker.backend().read(&self.checkpoint_key()).await {
            Ok(value) => value.map(Cursor),
            Err(err) => {
                tracing::warn!("Ignoring unreadable checkpoint: {}", err);
                None
            }
        }
    }

    async fn save_checkpoint(&self, cursor: &Cursor) {
        if let Err(err) = self
            .tracker
            .backend()
            .write(&self.checkpoint_key(), &cursor.0, self.tracker.ttl())
            .await
        {
            tracing::warn!("Could not store checkpoint: {}", err);
        }
    }

    async fn clear_checkpoint(&self) {
        if let Err(err) = self.tracker.backend().expire(&self.checkpoint_key()).await {
            tracing::warn!("Could not clear checkpoint: {}", err);
        }
    }
}
