//! Provider clients, one per external job-search source.
//!
//! Every provider is reached through the same narrow capability: a bounded,
//! retried search returning canonical Jobs. The aggregator never sees a
//! provider's HTTP shape; format churn stays behind each client's mapping
//! function.

pub mod adzuna;
pub mod jsearch;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::EngineConfig;
use crate::models::Job;

pub use adzuna::AdzunaProvider;
pub use jsearch::JSearchProvider;

/// One logical search request as a provider sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub keywords: String,
    pub location: Option<String>,
    /// Maximum number of jobs this provider should return for this call.
    pub limit: usize,
    /// Only postings at most this many days old, when the provider supports
    /// age filtering.
    pub max_age_days: Option<u32>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("rate limited after {retries} retries")]
    RateLimited { retries: u32 },
}

/// A single external job-search source. Implementations fail independently:
/// an error here degrades one provider's share of the results and nothing
/// else.
#[async_trait]
pub trait JobProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Job>, ProviderError>;
}

/// Sends a request, allowing one bounded retry after a rate-limit response.
/// Any other failure is returned as-is; the retry budget exists only for 429s.
pub(crate) async fn send_with_retry(
    request: reqwest::RequestBuilder,
    backoff: Duration,
) -> Result<reqwest::Response, ProviderError> {
    let retry = request.try_clone();

    let response = request.send().await?;
    if response.status().as_u16() != 429 {
        return Ok(response);
    }

    let Some(retry) = retry else {
        return Err(ProviderError::RateLimited { retries: 0 });
    };

    warn!(backoff_ms = backoff.as_millis() as u64, "rate limited, retrying once");
    tokio::time::sleep(backoff).await;

    let response = retry.send().await?;
    if response.status().as_u16() == 429 {
        return Err(ProviderError::RateLimited { retries: 1 });
    }
    Ok(response)
}

/// Turns a non-success response into an `Api` error with the body attached.
pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ProviderError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Builds the provider set for whichever credentials the configuration
/// carries. Job-search APIs are optional; an empty set is the caller's
/// problem to surface.
pub fn from_config(config: &EngineConfig) -> Vec<Arc<dyn JobProvider>> {
    let mut providers: Vec<Arc<dyn JobProvider>> = Vec::new();

    if let (Some(app_id), Some(app_key)) = (&config.adzuna_app_id, &config.adzuna_app_key) {
        providers.push(Arc::new(AdzunaProvider::new(
            app_id.clone(),
            app_key.clone(),
            config.rate_limit_backoff,
        )));
    }
    if let Some(api_key) = &config.jsearch_api_key {
        providers.push(Arc::new(JSearchProvider::new(
            api_key.clone(),
            config.rate_limit_backoff,
        )));
    }

    providers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_builds_only_configured_providers() {
        let mut config = EngineConfig::default();
        assert!(from_config(&config).is_empty());

        config.jsearch_api_key = Some("key".to_string());
        let providers = from_config(&config);
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].name(), "jsearch");

        config.adzuna_app_id = Some("id".to_string());
        config.adzuna_app_key = Some("key".to_string());
        let providers = from_config(&config);
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].name(), "adzuna");
    }
}
