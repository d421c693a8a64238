//! Durable storage seam for per-profile cache records.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read cache record: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to parse cache record: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to write cache record: {0}")]
    Write(#[source] std::io::Error),
}

/// One identifier the profile has already been shown.
///
/// `first_seen` is optional so records imported from older deployments that
/// never stamped timestamps stay representable; pruning retains such entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeenEntry {
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
}

/// The persisted per-profile record: every identifier already surfaced to the
/// profile, and the completion time of the last search per query key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheRecord {
    #[serde(default)]
    pub seen: HashMap<String, SeenEntry>,
    #[serde(default)]
    pub last_searches: HashMap<String, DateTime<Utc>>,
}

/// Key-value durable store keyed by profile name. Implementations must give
/// atomic-enough read-then-write semantics per profile; cross-profile
/// coordination is not required.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, profile: &str) -> Result<Option<CacheRecord>, CacheError>;
    async fn save(&self, profile: &str, record: &CacheRecord) -> Result<(), CacheError>;
}

/// File-backed store: one pretty-printed JSON file per profile in a single
/// directory. Writes go through a temp file and a rename so a crashed write
/// never leaves a torn record behind.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, profile: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slugify(profile)))
    }
}

/// Collapses a profile name into a filesystem-safe slug.
fn slugify(name: &str) -> String {
    let mut slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "default".to_string()
    } else {
        slug
    }
}

#[async_trait]
impl CacheStore for JsonFileStore {
    async fn load(&self, profile: &str) -> Result<Option<CacheRecord>, CacheError> {
        let path = self.path_for(profile);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Read(e)),
        };
        let record = serde_json::from_slice(&bytes)?;
        Ok(Some(record))
    }

    async fn save(&self, profile: &str, record: &CacheRecord) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(CacheError::Write)?;

        let path = self.path_for(profile);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(record)?;

        tokio::fs::write(&tmp, &body)
            .await
            .map_err(CacheError::Write)?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(CacheError::Write)?;

        debug!(profile, path = %path.display(), "cache record saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_sanitizes_names() {
        assert_eq!(slugify("Marketing Berlin"), "marketing-berlin");
        assert_eq!(slugify("data/analyst #2"), "data-analyst-2");
        assert_eq!(slugify("///"), "default");
    }

    #[tokio::test]
    async fn test_load_missing_profile_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let mut record = CacheRecord::default();
        record.seen.insert(
            "https://x.com/j/1".to_string(),
            SeenEntry {
                first_seen: Some(Utc::now()),
            },
        );
        record
            .last_searches
            .insert("data analyst|berlin".to_string(), Utc::now());

        store.save("Marketing Berlin", &record).await.unwrap();
        let loaded = store.load("Marketing Berlin").await.unwrap().unwrap();
        assert_eq!(loaded.seen.len(), 1);
        assert!(loaded.seen.contains_key("https://x.com/j/1"));
        assert_eq!(loaded.last_searches.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        tokio::fs::write(dir.path().join("broken.json"), b"{not json")
            .await
            .unwrap();

        let err = store.load("broken").await.unwrap_err();
        assert!(matches!(err, CacheError::Parse(_)));
    }

    #[tokio::test]
    async fn test_legacy_record_without_timestamps_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        tokio::fs::write(
            dir.path().join("legacy.json"),
            br#"{"seen": {"https://x.com/j/9": {}}}"#,
        )
        .await
        .unwrap();

        let record = store.load("legacy").await.unwrap().unwrap();
        assert!(record.seen["https://x.com/j/9"].first_seen.is_none());
        assert!(record.last_searches.is_empty());
    }
}
