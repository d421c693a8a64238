use serde::{Deserialize, Serialize};

use super::job::RankedJob;

/// How a fetch concluded. A suppressed fetch is a normal, reported outcome
/// ("no new results, try later"), distinguishable from a search that ran and
/// found nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    Completed,
    Suppressed,
}

/// Per-provider result summary for one fetch: how many jobs the provider
/// returned before dedup, and its error if it failed or timed out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderReport {
    pub provider: String,
    pub returned: usize,
    pub error: Option<String>,
}

/// Everything a fetch hands back to the caller: ranked survivors, the
/// per-provider breakdown, and warnings (cache degradation only; provider
/// failures live in their reports).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub outcome: FetchOutcome,
    pub jobs: Vec<RankedJob>,
    pub providers: Vec<ProviderReport>,
    pub warnings: Vec<String>,
}

impl FetchResult {
    pub fn suppressed() -> Self {
        Self {
            outcome: FetchOutcome::Suppressed,
            jobs: Vec::new(),
            providers: Vec::new(),
            warnings: Vec::new(),
        }
    }
}
