use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The external system's identifier for the project being imported from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceProjectKey(pub String);

impl fmt::Display for SourceProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque pagination position handed back by the external client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub api_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub name: String,
    pub base_url: String,
    pub credentials: Credentials,
    pub active: bool,
}

/// A record as fetched from the external system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRecord {
    pub id: String,
    pub data: HashMap<String, serde_json::Value>,
}

impl ExternalRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: HashMap::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    /// Looks up a dotted path such as `fields.reporter.displayName`.
    pub fn get_path(&self, path: &str) -> Option<&serde_json::Value> {
        let mut parts = path.split('.');
        let mut current = self.data.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get_path(path).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub records: Vec<ExternalRecord>,
    pub next_cursor: Option<Cursor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Opened,
    Closed,
}

/// The local representation handed to the record writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedRecord {
    pub kind: String,
    pub external_id: String,
    pub title: String,
    pub body: String,
    pub state: Option<RecordState>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    PartiallyFailed,
    Aborted,
    Cancelled,
}

impl RunStatus {
    /// Ordering used to fold several runs into one job status.
    fn rank(self) -> u8 {
        match self {
            RunStatus::Succeeded => 0,
            RunStatus::PartiallyFailed => 1,
            RunStatus::Cancelled => 2,
            RunStatus::Aborted => 3,
        }
    }

    pub fn worst(self, other: RunStatus) -> RunStatus {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub kind: String,
    pub applied: usize,
    pub skipped: usize,
    pub discarded: usize,
    pub failed: usize,
    pub pages: usize,
    pub status: RunStatus,
    pub last_error: Option<String>,
    pub duration: Duration,
}

impl RunResult {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            applied: 0,
            skipped: 0,
            discarded: 0,
            failed: 0,
            pages: 0,
            status: RunStatus::Succeeded,
            last_error: None,
            duration: Duration::ZERO,
        }
    }

    pub fn record_failure(&mut self, error: &crate::utils::error::ImportError) {
        self.failed += 1;
        self.last_error = Some(error.to_string());
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub project: ProjectId,
    pub source_project: SourceProjectKey,
    pub runs: Vec<RunResult>,
}

impl JobReport {
    pub fn status(&self) -> RunStatus {
        self.runs
            .iter()
            .fold(RunStatus::Succeeded, |acc, run| acc.worst(run.status))
    }

    pub fn total_applied(&self) -> usize {
        self.runs.iter().map(|r| r.applied).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_path_walks_nested_objects() {
        let record = ExternalRecord::new("10001")
            .with_field("key", json!("PROJ-1"))
            .with_field("fields", json!({"reporter": {"displayName": "Ada"}}));

        assert_eq!(record.get_str("key"), Some("PROJ-1"));
        assert_eq!(record.get_str("fields.reporter.displayName"), Some("Ada"));
        assert!(record.get_path("fields.assignee.displayName").is_none());
    }

    #[test]
    fn test_job_status_takes_worst_run() {
        let mut ok = RunResult::new("labels");
        ok.status = RunStatus::Succeeded;
        let mut partial = RunResult::new("issues");
        partial.status = RunStatus::PartiallyFailed;

        let report = JobReport {
            project: ProjectId(1),
            source_project: SourceProjectKey("PROJ".to_string()),
            runs: vec![ok, partial],
        };
        assert_eq!(report.status(), RunStatus::PartiallyFailed);
        assert_eq!(RunStatus::Aborted.worst(RunStatus::Cancelled), RunStatus::Aborted);
    }
}
