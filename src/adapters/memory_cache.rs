use crate::domain::ports::CacheBackend;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Expiring<T> {
    pub value: T,
    pub expires_at: DateTime<Utc>,
}

impl<T> Expiring<T> {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

pub(crate) fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Sets and plain values with per-key expiry. Adding to a set refreshes the
/// expiry of the whole set.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct CacheState {
    #[serde(default)]
    sets: HashMap<String, Expiring<HashSet<String>>>,
    #[serde(default)]
    values: HashMap<String, Expiring<String>>,
}

impl CacheState {
    pub fn set_add(&mut self, key: &str, member: &str, ttl: Duration, now: DateTime<Utc>) {
        self.set_add_until(key, member, expiry(now, ttl), now);
    }

    pub fn set_add_until(
        &mut self,
        key: &str,
        member: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        let entry = self
            .sets
            .entry(key.to_string())
            .or_insert_with(|| Expiring {
                value: HashSet::new(),
                expires_at,
            });
        if !entry.is_live(now) {
            entry.value.clear();
        }
        entry.value.insert(member.to_string());
        entry.expires_at = expires_at;
    }

    pub fn set_includes(&self, key: &str, member: &str, now: DateTime<Utc>) -> bool {
        self.sets
            .get(key)
            .filter(|entry| entry.is_live(now))
            .is_some_and(|entry| entry.value.contains(member))
    }

    pub fn write(&mut self, key: &str, value: &str, ttl: Duration, now: DateTime<Utc>) {
        self.write_until(key, value, expiry(now, ttl));
    }

    pub fn write_until(&mut self, key: &str, value: &str, expires_at: DateTime<Utc>) {
        self.values.insert(
            key.to_string(),
            Expiring {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    pub fn read(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        self.values
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    pub fn expire(&mut self, key: &str) {
        self.sets.remove(key);
        self.values.remove(key);
    }

    /// Drops expired entries so persisted state does not grow forever.
    pub fn purge(&mut self, now: DateTime<Utc>) {
        self.sets.retain(|_, entry| entry.is_live(now));
        self.values.retain(|_, entry| entry.is_live(now));
    }
}

/// Process-local cache backend. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryCache {
    state: Mutex<CacheState>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> Result<()> {
        self.state.lock().await.set_add(key, member, ttl, Utc::now());
        Ok(())
    }

    async fn set_includes(&self, key: &str, member: &str) -> Result<bool> {
        Ok(self.state.lock().await.set_includes(key, member, Utc::now()))
    }

    async fn write(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.state.lock().await.write(key, value, ttl, Utc::now());
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state.lock().await.read(key, Utc::now()))
    }

    async fn expire(&self, key: &str) -> Result<()> {
        self.state.lock().await.expire(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_set_expires_and_restarts_empty() {
        let mut state = CacheState::default();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ttl = Duration::from_secs(60);

        state.set_add("k", "a", ttl, start);
        assert!(state.set_includes("k", "a", start + chrono::Duration::seconds(59)));
        assert!(!state.set_includes("k", "a", start + chrono::Duration::seconds(60)));

        let later = start + chrono::Duration::seconds(120);
        state.set_add("k", "b", ttl, later);
        assert!(!state.set_includes("k", "a", later));
        assert!(state.set_includes("k", "b", later));
    }

    #[test]
    fn test_add_refreshes_expiry() {
        let mut state = CacheState::default();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ttl = Duration::from_secs(60);

        state.set_add("k", "a", ttl, start);
        state.set_add("k", "b", ttl, start + chrono::Duration::seconds(50));

        let later = start + chrono::Duration::seconds(90);
        assert!(state.set_includes("k", "a", later));
        assert!(state.set_includes("k", "b", later));
    }

    #[tokio::test]
    async fn test_values_round_trip_and_expire() {
        let cache = MemoryCache::new();
        cache.write("cursor", "100", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.read("cursor").await.unwrap(), Some("100".to_string()));

        cache.expire("cursor").await.unwrap();
        assert_eq!(cache.read("cursor").await.unwrap(), None);
    }
}
