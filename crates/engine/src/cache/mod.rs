//! Profile-scoped memory of already-surfaced jobs and recent searches.
//!
//! State is partitioned by profile: every mutation runs under that profile's
//! own async mutex, so concurrent searches for the same profile cannot race
//! while searches for different profiles proceed fully in parallel.

pub mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::Job;

pub use store::{CacheError, CacheRecord, CacheStore, JsonFileStore, SeenEntry};

pub struct ProfileCache {
    store: Arc<dyn CacheStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ProfileCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, profile: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(profile.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load_or_default(&self, profile: &str) -> Result<CacheRecord, CacheError> {
        Ok(self.store.load(profile).await?.unwrap_or_default())
    }

    /// True iff this identifier has already been surfaced to the profile.
    pub async fn is_processed(&self, profile: &str, identifier: &str) -> Result<bool, CacheError> {
        let lock = self.lock_for(profile);
        let _guard = lock.lock().await;
        let record = self.load_or_default(profile).await?;
        Ok(record.seen.contains_key(identifier))
    }

    /// Remembers a job as surfaced. Idempotent: re-marking an existing
    /// identifier changes nothing, including its original first-seen time.
    pub async fn mark_processed(&self, profile: &str, job: &Job) -> Result<(), CacheError> {
        let lock = self.lock_for(profile);
        let _guard = lock.lock().await;
        let mut record = self.load_or_default(profile).await?;
        if record.seen.contains_key(&job.identifier) {
            return Ok(());
        }
        record.seen.insert(
            job.identifier.clone(),
            SeenEntry {
                first_seen: job.first_seen.or_else(|| Some(Utc::now())),
            },
        );
        self.store.save(profile, &record).await
    }

    /// Point-in-time copy of the profile's record, for a merge pass that must
    /// filter against a consistent view.
    pub async fn snapshot(&self, profile: &str) -> Result<CacheRecord, CacheError> {
        let lock = self.lock_for(profile);
        let _guard = lock.lock().await;
        self.load_or_default(profile).await
    }

    /// True iff a prior search for this exact query key completed strictly
    /// within `window`.
    pub async fn should_suppress(
        &self,
        profile: &str,
        query_key: &str,
        window: Duration,
    ) -> Result<bool, CacheError> {
        let lock = self.lock_for(profile);
        let _guard = lock.lock().await;
        let record = self.load_or_default(profile).await?;
        let Some(last) = record.last_searches.get(query_key) else {
            return Ok(false);
        };
        let elapsed = Utc::now().signed_duration_since(*last);
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());
        Ok(elapsed >= chrono::Duration::zero() && elapsed < window)
    }

    pub async fn record_search(
        &self,
        profile: &str,
        query_key: &str,
        at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let lock = self.lock_for(profile);
        let _guard = lock.lock().await;
        let mut record = self.load_or_default(profile).await?;
        record.last_searches.insert(query_key.to_string(), at);
        self.store.save(profile, &record).await
    }

    /// One critical section for the aggregator's post-merge bookkeeping:
    /// remembers every surviving identifier and stamps the last-search time
    /// for the query key.
    pub async fn record_results(
        &self,
        profile: &str,
        identifiers: &[(String, DateTime<Utc>)],
        query_key: &str,
        at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let lock = self.lock_for(profile);
        let _guard = lock.lock().await;
        let mut record = self.load_or_default(profile).await?;
        for (identifier, first_seen) in identifiers {
            record
                .seen
                .entry(identifier.clone())
                .or_insert_with(|| SeenEntry {
                    first_seen: Some(*first_seen),
                });
        }
        record.last_searches.insert(query_key.to_string(), at);
        self.store.save(profile, &record).await
    }

    /// Drops identifiers strictly older than `max_age_days` (age > N days,
    /// not >=). Entries without a usable timestamp are retained. Returns how
    /// many were removed.
    pub async fn prune(&self, profile: &str, max_age_days: u32) -> Result<usize, CacheError> {
        let lock = self.lock_for(profile);
        let _guard = lock.lock().await;
        let mut record = self.load_or_default(profile).await?;

        let cutoff = Utc::now() - chrono::Duration::days(i64::from(max_age_days));
        let before = record.seen.len();
        record.seen.retain(|_, entry| match entry.first_seen {
            Some(first_seen) => first_seen >= cutoff,
            None => true,
        });
        let removed = before - record.seen.len();

        if removed > 0 {
            self.store.save(profile, &record).await?;
        }
        debug!(profile, removed, max_age_days, "cache pruned");
        Ok(removed)
    }

    /// Clears one profile's identifiers and search timestamps. Other profiles
    /// are untouched; any backup is the caller's responsibility.
    pub async fn reset(&self, profile: &str) -> Result<(), CacheError> {
        let lock = self.lock_for(profile);
        let _guard = lock.lock().await;
        self.store.save(profile, &CacheRecord::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Job;

    fn cache_in(dir: &std::path::Path) -> ProfileCache {
        ProfileCache::new(Arc::new(JsonFileStore::new(dir)))
    }

    fn job(identifier: &str) -> Job {
        let mut job = Job::new("Data Analyst", "Acme", "adzuna");
        job.identifier = identifier.to_string();
        job
    }

    #[tokio::test]
    async fn test_mark_then_is_processed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        assert!(!cache.is_processed("p1", "id-1").await.unwrap());
        cache.mark_processed("p1", &job("id-1")).await.unwrap();
        assert!(cache.is_processed("p1", "id-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_processed_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        let mut first = job("id-1");
        first.first_seen = Some(Utc::now() - chrono::Duration::days(3));
        cache.mark_processed("p1", &first).await.unwrap();
        let original = cache.snapshot("p1").await.unwrap().seen["id-1"].first_seen;

        let mut again = job("id-1");
        again.first_seen = Some(Utc::now());
        cache.mark_processed("p1", &again).await.unwrap();

        let snapshot = cache.snapshot("p1").await.unwrap();
        assert_eq!(snapshot.seen.len(), 1);
        assert_eq!(snapshot.seen["id-1"].first_seen, original);
    }

    #[tokio::test]
    async fn test_profiles_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.mark_processed("p1", &job("id-1")).await.unwrap();
        assert!(cache.is_processed("p1", "id-1").await.unwrap());
        assert!(!cache.is_processed("p2", "id-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_clears_only_one_profile() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.mark_processed("p1", &job("id-1")).await.unwrap();
        cache.mark_processed("p2", &job("id-2")).await.unwrap();
        cache.record_search("p1", "key", Utc::now()).await.unwrap();

        cache.reset("p1").await.unwrap();

        let p1 = cache.snapshot("p1").await.unwrap();
        assert!(p1.seen.is_empty());
        assert!(p1.last_searches.is_empty());
        assert!(cache.is_processed("p2", "id-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_suppression_within_window() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        let window = Duration::from_secs(600);

        assert!(!cache.should_suppress("p1", "key", window).await.unwrap());

        cache.record_search("p1", "key", Utc::now()).await.unwrap();
        assert!(cache.should_suppress("p1", "key", window).await.unwrap());
        assert!(!cache.should_suppress("p1", "other", window).await.unwrap());
    }

    #[tokio::test]
    async fn test_suppression_expires_after_window() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        let window = Duration::from_secs(600);

        let stale = Utc::now() - chrono::Duration::seconds(601);
        cache.record_search("p1", "key", stale).await.unwrap();
        assert!(!cache.should_suppress("p1", "key", window).await.unwrap());
    }

    #[tokio::test]
    async fn test_prune_boundary_is_strictly_older() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        let mut old = job("old");
        old.first_seen = Some(Utc::now() - chrono::Duration::days(30) - chrono::Duration::hours(1));
        let mut boundary = job("boundary");
        // A hair inside the 30-day window: must be retained.
        boundary.first_seen =
            Some(Utc::now() - chrono::Duration::days(30) + chrono::Duration::seconds(5));
        let mut fresh = job("fresh");
        fresh.first_seen = Some(Utc::now());

        for j in [&old, &boundary, &fresh] {
            cache.mark_processed("p1", j).await.unwrap();
        }

        let removed = cache.prune("p1", 30).await.unwrap();
        assert_eq!(removed, 1);

        let snapshot = cache.snapshot("p1").await.unwrap();
        assert!(!snapshot.seen.contains_key("old"));
        assert!(snapshot.seen.contains_key("boundary"));
        assert!(snapshot.seen.contains_key("fresh"));
    }

    #[tokio::test]
    async fn test_prune_retains_entries_without_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path()));

        let mut record = CacheRecord::default();
        record.seen.insert("no-date".to_string(), SeenEntry { first_seen: None });
        store.save("p1", &record).await.unwrap();

        let cache = ProfileCache::new(store);
        let removed = cache.prune("p1", 30).await.unwrap();
        assert_eq!(removed, 0);
        assert!(cache.is_processed("p1", "no-date").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_results_bulk_write() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        let now = Utc::now();

        cache
            .record_results(
                "p1",
                &[("id-1".to_string(), now), ("id-2".to_string(), now)],
                "data analyst|berlin",
                now,
            )
            .await
            .unwrap();

        assert!(cache.is_processed("p1", "id-1").await.unwrap());
        assert!(cache.is_processed("p1", "id-2").await.unwrap());
        assert!(cache
            .should_suppress("p1", "data analyst|berlin", Duration::from_secs(600))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = cache_in(dir.path());
            cache.mark_processed("p1", &job("id-1")).await.unwrap();
        }
        let reopened = cache_in(dir.path());
        assert!(reopened.is_processed("p1", "id-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_same_profile_marks_do_not_lose_writes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(cache_in(dir.path()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.mark_processed("p1", &job(&format!("id-{i}"))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let snapshot = cache.snapshot("p1").await.unwrap();
        assert_eq!(snapshot.seen.len(), 8);
    }
}
