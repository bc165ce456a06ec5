use crate::adapters::memory_cache::{expiry, CacheState};
use crate::domain::ports::CacheBackend;
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;

/// One mutation, as appended to the journal.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum JournalEntry {
    SetAdd {
        key: String,
        member: String,
        at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
    Write {
        key: String,
        value: String,
        expires_at: DateTime<Utc>,
    },
    Expire {
        key: String,
    },
}

impl JournalEntry {
    fn apply(&self, state: &mut CacheState) {
        match self {
            JournalEntry::SetAdd {
                key,
                member,
                at,
                expires_at,
            } => state.set_add_until(key, member, *expires_at, *at),
            JournalEntry::Write {
                key,
                value,
                expires_at,
            } => state.write_until(key, value, *expires_at),
            JournalEntry::Expire { key } => state.expire(key),
        }
    }
}

/// Cache backend persisted to disk, so dedup sets and checkpoints survive a
/// restart. The cache file holds a JSON snapshot; mutations are appended to
/// a journal next to it and folded into the snapshot on [`FileCache::open`].
#[derive(Debug)]
pub struct FileCache {
    journal: PathBuf,
    state: Mutex<CacheState>,
}

impl FileCache {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let journal = path.with_extension("journal");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut state = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                CacheState::default()
            } else {
                serde_json::from_str(&content).map_err(|e| ImportError::Cache {
                    message: format!("corrupt cache file {}: {}", path.display(), e),
                })?
            }
        } else {
            CacheState::default()
        };
        let replayed = replay(&journal, &mut state)?;
        state.purge(Utc::now());

        // Compact: the snapshot must land before the journal is emptied.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(&state)?)?;
        fs::rename(&tmp, &path)?;
        fs::File::create(&journal)?;

        tracing::debug!(
            "Opened cache file {} ({} journal entries folded in)",
            path.display(),
            replayed
        );
        Ok(Self {
            journal,
            state: Mutex::new(state),
        })
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal
    }

    fn append(&self, entry: &JournalEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal)?;
        file.write_all(&line)?;
        Ok(())
    }

    /// Journals `entry`, then applies it. A failed write leaves the
    /// in-memory state untouched.
    async fn commit(&self, entry: JournalEntry) -> Result<()> {
        let mut state = self.state.lock().await;
        self.append(&entry)?;
        entry.apply(&mut state);
        Ok(())
    }
}

/// Applies journal entries in order. A torn last line from a crash
/// mid-write is dropped; damage anywhere else is an error.
fn replay(journal: &Path, state: &mut CacheState) -> Result<usize> {
    if !journal.exists() {
        return Ok(0);
    }
    let content = fs::read_to_string(journal)?;
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();

    for (index, line) in lines.iter().enumerate() {
        match serde_json::from_str::<JournalEntry>(line) {
            Ok(entry) => entry.apply(state),
            Err(e) if index + 1 == lines.len() => {
                tracing::warn!("Dropping torn journal entry in {}: {}", journal.display(), e);
            }
            Err(e) => {
                return Err(ImportError::Cache {
                    message: format!(
                        "corrupt journal {} at entry {}: {}",
                        journal.display(),
                        index + 1,
                        e
                    ),
                })
            }
        }
    }
    Ok(lines.len())
}

#[async_trait]
impl CacheBackend for FileCache {
    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> Result<()> {
        let now = Utc::now();
        self.commit(JournalEntry::SetAdd {
            key: key.to_string(),
            member: member.to_string(),
            at: now,
            expires_at: expiry(now, ttl),
        })
        .await
    }

    async fn set_includes(&self, key: &str, member: &str) -> Result<bool> {
        Ok(self.state.lock().await.set_includes(key, member, Utc::now()))
    }

    async fn write(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.commit(JournalEntry::Write {
            key: key.to_string(),
            value: value.to_string(),
            expires_at: expiry(Utc::now(), ttl),
        })
        .await
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state.lock().await.read(key, Utc::now()))
    }

    async fn expire(&self, key: &str) -> Result<()> {
        self.commit(JournalEntry::Expire {
            key: key.to_string(),
        })
        .await
    }
}
