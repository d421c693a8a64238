use std::time::Duration;

use anyhow::{Context, Result};

/// Engine tuning knobs plus optional provider credentials.
///
/// The suppression window and recency ceiling are product-tuned values
/// carried over from the original deployment; they are configuration, not
/// constants, so operators can adjust them without a rebuild.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum time between two searches with identical parameters for the
    /// same profile before a new network search is allowed.
    pub suppression_window: Duration,
    /// Wall-clock budget for a single provider call inside one fetch.
    pub provider_timeout: Duration,
    /// Pause before the single retry a provider gets after a rate-limit
    /// response.
    pub rate_limit_backoff: Duration,
    /// Age at which the recency ranking factor reaches zero.
    pub recency_max_age_days: f64,
    pub adzuna_app_id: Option<String>,
    pub adzuna_app_key: Option<String>,
    pub jsearch_api_key: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            suppression_window: Duration::from_secs(10 * 60),
            provider_timeout: Duration::from_secs(30),
            rate_limit_backoff: Duration::from_secs(1),
            recency_max_age_days: 30.0,
            adzuna_app_id: None,
            adzuna_app_key: None,
            jsearch_api_key: None,
        }
    }
}

impl EngineConfig {
    /// Loads the configuration from the environment, falling back to the
    /// defaults for anything unset. Reads `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Self::default();

        Ok(Self {
            suppression_window: env_secs("SUPPRESSION_WINDOW_SECS")?
                .unwrap_or(defaults.suppression_window),
            provider_timeout: env_secs("PROVIDER_TIMEOUT_SECS")?
                .unwrap_or(defaults.provider_timeout),
            rate_limit_backoff: env_millis("RATE_LIMIT_BACKOFF_MS")?
                .unwrap_or(defaults.rate_limit_backoff),
            recency_max_age_days: match std::env::var("RECENCY_MAX_AGE_DAYS") {
                Ok(v) => v
                    .parse::<f64>()
                    .context("RECENCY_MAX_AGE_DAYS must be a number of days")?,
                Err(_) => defaults.recency_max_age_days,
            },
            adzuna_app_id: std::env::var("ADZUNA_APP_ID").ok(),
            adzuna_app_key: std::env::var("ADZUNA_APP_KEY").ok(),
            jsearch_api_key: std::env::var("JSEARCH_API_KEY").ok(),
        })
    }
}

fn env_secs(key: &str) -> Result<Option<Duration>> {
    match std::env::var(key) {
        Ok(v) => {
            let secs = v
                .parse::<u64>()
                .with_context(|| format!("{key} must be a whole number of seconds"))?;
            Ok(Some(Duration::from_secs(secs)))
        }
        Err(_) => Ok(None),
    }
}

fn env_millis(key: &str) -> Result<Option<Duration>> {
    match std::env::var(key) {
        Ok(v) => {
            let millis = v
                .parse::<u64>()
                .with_context(|| format!("{key} must be a whole number of milliseconds"))?;
            Ok(Some(Duration::from_millis(millis)))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_keep_product_tuned_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.suppression_window, Duration::from_secs(600));
        assert_eq!(cfg.provider_timeout, Duration::from_secs(30));
        assert_eq!(cfg.rate_limit_backoff, Duration::from_secs(1));
        assert_eq!(cfg.recency_max_age_days, 30.0);
        assert!(cfg.adzuna_app_id.is_none());
    }
}
