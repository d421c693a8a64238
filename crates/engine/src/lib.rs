//! Job-search aggregation engine.
//!
//! Fans a logical query out to external job-search providers, deduplicates
//! postings within and across sources, remembers what each search profile has
//! already seen, suppresses redundant re-searches, and returns a
//! deterministically ranked result list. Everything crossing the crate
//! boundary is plain serde data; HTML scraping, letter generation, and
//! document rendering live in downstream consumers.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod errors;
pub mod models;
pub mod normalize;
pub mod providers;
pub mod ranking;

pub use aggregator::AggregationManager;
pub use cache::{CacheError, CacheRecord, CacheStore, JsonFileStore, ProfileCache};
pub use config::EngineConfig;
pub use errors::EngineError;
pub use models::{
    FetchOutcome, FetchResult, Job, ProviderReport, RankedJob, RankingWeights, RemoteFlag,
    SalaryRange, SearchProfile,
};
pub use providers::{AdzunaProvider, JSearchProvider, JobProvider, ProviderError, SearchQuery};
pub use ranking::RankingEngine;
