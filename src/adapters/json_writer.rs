use crate::domain::model::{FormattedRecord, LocalId, ProjectId};
use crate::domain::ports::RecordWriter;
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Debug, Serialize, Deserialize)]
pub struct StoredRecord {
    pub local_id: u64,
    #[serde(flatten)]
    pub record: FormattedRecord,
}

/// Appends records to `{base}/{project}/{kind}.jsonl`. A record whose
/// external id is already in the file is not written again; its existing
/// local id is returned instead.
#[derive(Debug)]
pub struct JsonLinesWriter {
    base_path: PathBuf,
    index: Mutex<HashMap<PathBuf, HashMap<String, u64>>>,
}

impl JsonLinesWriter {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            index: Mutex::new(HashMap::new()),
        }
    }

    pub fn file_for(&self, project: &ProjectId, kind: &str) -> PathBuf {
        self.base_path
            .join(project.to_string())
            .join(format!("{}.jsonl", kind))
    }

    /// Reads back everything written for one kind, in write order.
    pub fn read_all(&self, project: &ProjectId, kind: &str) -> Result<Vec<StoredRecord>> {
        load(&self.file_for(project, kind))
    }
}

fn load(path: &Path) -> Result<Vec<StoredRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    fs::read_to_string(path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(ImportError::from))
        .collect()
}

#[async_trait]
impl RecordWriter for JsonLinesWriter {
    async fn apply_record(&self, project: &ProjectId, record: &FormattedRecord) -> Result<LocalId> {
        let path = self.file_for(project, &record.kind);
        let mut index = self.index.lock().await;

        if !index.contains_key(&path) {
            let existing = load(&path)?
                .into_iter()
                .map(|stored| (stored.record.external_id, stored.local_id))
                .collect();
            index.insert(path.clone(), existing);
        }
        let ids = index.entry(path.clone()).or_default();

        if let Some(local_id) = ids.get(&record.external_id) {
            tracing::debug!(
                "{} {} already stored as {}",
                record.kind,
                record.external_id,
                local_id
            );
            return Ok(LocalId(*local_id));
        }

        let local_id = ids.values().copied().max().unwrap_or(0) + 1;
        let line = serde_json::to_string(&StoredRecord {
            local_id,
            record: record.clone(),
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", line)?;

        ids.insert(record.external_id.clone(), local_id);
        Ok(LocalId(local_id))
    }
}
