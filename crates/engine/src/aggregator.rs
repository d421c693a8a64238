//! Fan-out, merge, dedup, and bookkeeping for one logical search.
//!
//! The manager is the only writer of profile cache state and the only caller
//! of providers; everything it returns is plain data. Provider failures are
//! contained per provider, cache failures degrade to warnings, and a
//! suppressed search is a reported outcome rather than an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cache::ProfileCache;
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::models::{FetchOutcome, FetchResult, Job, ProviderReport, SearchProfile};
use crate::normalize::{compute_identifier, query_key};
use crate::providers::{JobProvider, ProviderError, SearchQuery};
use crate::ranking::RankingEngine;

/// How often the collection loop rechecks the caller's cancellation flag
/// while providers are still in flight.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct AggregationManager {
    providers: Vec<Arc<dyn JobProvider>>,
    cache: ProfileCache,
    ranker: RankingEngine,
    config: EngineConfig,
}

impl AggregationManager {
    pub fn new(
        providers: Vec<Arc<dyn JobProvider>>,
        cache: ProfileCache,
        config: EngineConfig,
    ) -> Self {
        Self {
            providers,
            cache,
            ranker: RankingEngine::new(config.recency_max_age_days),
            config,
        }
    }

    /// Runs one logical search for a profile: suppression check, concurrent
    /// provider fan-out, cross-provider dedup, already-seen filtering,
    /// ranking, and cache bookkeeping.
    pub async fn fetch(
        &self,
        profile: &SearchProfile,
        keywords: &str,
        location: Option<&str>,
        max_total: usize,
        max_age_days: Option<u32>,
    ) -> Result<FetchResult, EngineError> {
        self.fetch_with_cancel(
            profile,
            keywords,
            location,
            max_total,
            max_age_days,
            Arc::new(AtomicBool::new(false)),
        )
        .await
    }

    /// Like `fetch`, honoring an external cancellation flag: once set,
    /// in-flight provider calls are abandoned and whatever has completed is
    /// merged and returned.
    pub async fn fetch_with_cancel(
        &self,
        profile: &SearchProfile,
        keywords: &str,
        location: Option<&str>,
        max_total: usize,
        max_age_days: Option<u32>,
        cancel: Arc<AtomicBool>,
    ) -> Result<FetchResult, EngineError> {
        self.validate(profile, keywords, max_total)?;

        let mut warnings = Vec::new();
        let key = query_key(keywords, location);

        match self
            .cache
            .should_suppress(&profile.name, &key, self.config.suppression_window)
            .await
        {
            Ok(true) => {
                debug!(profile = %profile.name, key = %key, "search suppressed");
                return Ok(FetchResult::suppressed());
            }
            Ok(false) => {}
            Err(e) => {
                warn!(profile = %profile.name, error = %e, "suppression check failed, proceeding");
                warnings.push(format!(
                    "cache unavailable for suppression check: {e}; search ran unconditionally"
                ));
            }
        }

        // Ceil-divide the budget; a provider that under-delivers does not
        // hand its share to the others within this call.
        let share = max_total.div_ceil(self.providers.len());
        let query = SearchQuery {
            keywords: keywords.to_string(),
            location: location.map(str::to_string),
            limit: share,
            max_age_days,
        };

        let (slots, cancelled) = self.run_providers(&query, &cancel).await;

        // Snapshot before the merge: the same view both filters already-seen
        // identifiers and defines is_new_since_last_search.
        let snapshot = match self.cache.snapshot(&profile.name).await {
            Ok(record) => record,
            Err(e) => {
                warn!(profile = %profile.name, error = %e, "cache snapshot failed");
                warnings.push(format!(
                    "cache unavailable: {e}; previously seen jobs may reappear"
                ));
                Default::default()
            }
        };

        let now = Utc::now();
        let mut reports = Vec::with_capacity(self.providers.len());
        let mut merged: Vec<Job> = Vec::new();
        let mut seen_in_merge = std::collections::HashSet::new();

        for (provider, slot) in self.providers.iter().zip(slots) {
            let report = match slot {
                Some(Ok(jobs)) => {
                    let returned = jobs.len();
                    for mut job in jobs {
                        if merged.len() >= max_total {
                            break;
                        }
                        job.identifier = compute_identifier(&job);
                        if !seen_in_merge.insert(job.identifier.clone()) {
                            continue; // first occurrence wins
                        }
                        if snapshot.seen.contains_key(&job.identifier) {
                            continue; // already surfaced to this profile
                        }
                        job.first_seen = Some(now);
                        job.is_new_since_last_search = !snapshot.seen.contains_key(&job.identifier);
                        merged.push(job);
                    }
                    ProviderReport {
                        provider: provider.name().to_string(),
                        returned,
                        error: None,
                    }
                }
                Some(Err(e)) => ProviderReport {
                    provider: provider.name().to_string(),
                    returned: 0,
                    error: Some(e.to_string()),
                },
                None => ProviderReport {
                    provider: provider.name().to_string(),
                    returned: 0,
                    error: Some(if cancelled {
                        "cancelled before completion".to_string()
                    } else {
                        "did not complete".to_string()
                    }),
                },
            };
            reports.push(report);
        }

        let recorded: Vec<(String, chrono::DateTime<Utc>)> = merged
            .iter()
            .map(|job| (job.identifier.clone(), now))
            .collect();
        if let Err(e) = self
            .cache
            .record_results(&profile.name, &recorded, &key, now)
            .await
        {
            warn!(profile = %profile.name, error = %e, "cache write failed");
            warnings.push(format!(
                "cache write failed: {e}; these jobs may be returned again"
            ));
        }

        debug!(
            profile = %profile.name,
            merged = merged.len(),
            providers = reports.len(),
            cancelled,
            "fetch complete"
        );

        Ok(FetchResult {
            outcome: FetchOutcome::Completed,
            jobs: self.ranker.rank_at(merged, profile, now),
            providers: reports,
            warnings,
        })
    }

    /// Fans the query out to every provider concurrently, each under its own
    /// timeout, and collects results into enumeration-order slots so the
    /// merge order never depends on completion order. Returns early when the
    /// cancellation flag flips, aborting whatever is still in flight.
    async fn run_providers(
        &self,
        query: &SearchQuery,
        cancel: &AtomicBool,
    ) -> (Vec<Option<Result<Vec<Job>, ProviderError>>>, bool) {
        let timeout = self.config.provider_timeout;
        let mut set = JoinSet::new();
        for (index, provider) in self.providers.iter().enumerate() {
            let provider = Arc::clone(provider);
            let query = query.clone();
            set.spawn(async move {
                let result = match tokio::time::timeout(timeout, provider.search(&query)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout {
                        seconds: timeout.as_secs(),
                    }),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<Result<Vec<Job>, ProviderError>>> =
            (0..self.providers.len()).map(|_| None).collect();
        let mut cancelled = false;

        loop {
            if cancel.load(Ordering::Relaxed) {
                cancelled = true;
                set.abort_all();
                // Drain: aborted tasks surface as JoinErrors and are dropped,
                // completed ones still deliver their results.
                while let Some(joined) = set.join_next().await {
                    if let Ok((index, result)) = joined {
                        slots[index] = Some(result);
                    }
                }
                break;
            }

            tokio::select! {
                joined = set.join_next() => {
                    match joined {
                        None => break,
                        Some(Ok((index, result))) => slots[index] = Some(result),
                        Some(Err(e)) => warn!(error = %e, "provider task failed"),
                    }
                }
                _ = tokio::time::sleep(CANCEL_POLL_INTERVAL) => {}
            }
        }

        (slots, cancelled)
    }

    fn validate(
        &self,
        profile: &SearchProfile,
        keywords: &str,
        max_total: usize,
    ) -> Result<(), EngineError> {
        if profile.name.trim().is_empty() {
            return Err(EngineError::Validation("profile name is empty".into()));
        }
        if keywords.trim().is_empty() {
            return Err(EngineError::Validation("keywords are empty".into()));
        }
        if max_total == 0 {
            return Err(EngineError::Validation("max_total must be at least 1".into()));
        }
        if !profile.weights.is_valid() {
            return Err(EngineError::Validation(
                "ranking weights must be non-negative finite numbers".into(),
            ));
        }
        if self.providers.is_empty() {
            return Err(EngineError::Validation("no providers configured".into()));
        }
        Ok(())
    }
}
