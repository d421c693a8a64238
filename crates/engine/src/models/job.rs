use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a posting is remote. Providers that carry no remote field map to
/// `Unknown`; downstream scoring treats the three states differently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteFlag {
    Yes,
    No,
    #[default]
    Unknown,
}

/// Numeric salary bounds as reported by the provider. Either bound may be
/// absent; no defaulting is applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
}

impl SalaryRange {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// A job posting in canonical form, immutable once normalized.
///
/// `identifier` is the single dedup key (see `normalize::compute_identifier`);
/// two Jobs are the same posting iff their identifiers match. `raw` keeps the
/// provider's untouched payload for downstream content building and takes no
/// part in identity or ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub identifier: String,
    pub title: String,
    pub company: String,
    /// Empty when the provider omitted a location.
    pub location: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub platform: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub salary: Option<SalaryRange>,
    pub remote: RemoteFlag,
    pub employment_type: Option<String>,
    pub raw: serde_json::Value,
    /// Stamped by the aggregator when the job first survives a merge.
    pub first_seen: Option<DateTime<Utc>>,
    pub is_new_since_last_search: bool,
}

impl Job {
    /// A job with only the fields every provider is guaranteed to produce.
    /// The identifier is left empty; the aggregator derives it before any
    /// identity check.
    pub fn new(title: impl Into<String>, company: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            identifier: String::new(),
            title: title.into(),
            company: company.into(),
            location: String::new(),
            description: None,
            url: None,
            platform: platform.into(),
            posted_at: None,
            salary: None,
            remote: RemoteFlag::Unknown,
            employment_type: None,
            raw: serde_json::Value::Null,
            first_seen: None,
            is_new_since_last_search: false,
        }
    }
}

/// A scored job produced by the ranking engine. Recomputed on every ranking
/// call, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedJob {
    pub job: Job,
    pub score: f64,
    /// 1-based position in the ranked list.
    pub rank: usize,
}
