//! Adzuna search client (https://developer.adzuna.com).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::{Job, SalaryRange};

use super::{error_for_status, send_with_retry, JobProvider, ProviderError, SearchQuery};

const ADZUNA_API_URL: &str = "https://api.adzuna.com/v1/api/jobs";
const DEFAULT_COUNTRY: &str = "de";

pub struct AdzunaProvider {
    client: reqwest::Client,
    app_id: String,
    app_key: String,
    country: String,
    base_url: String,
    backoff: Duration,
}

impl AdzunaProvider {
    pub fn new(app_id: String, app_key: String, backoff: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            app_id,
            app_key,
            country: DEFAULT_COUNTRY.to_string(),
            base_url: ADZUNA_API_URL.to_string(),
            backoff,
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    /// Points the client at a different endpoint. Tests aim this at a mock
    /// server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn map_job(&self, raw: serde_json::Value) -> Option<Job> {
        let fields: AdzunaJob = match serde_json::from_value(raw.clone()) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "skipping unmappable adzuna result");
                return None;
            }
        };

        let mut job = Job::new(
            fields.title?,
            fields
                .company
                .and_then(|c| c.display_name)
                .unwrap_or_default(),
            "adzuna",
        );
        job.location = fields
            .location
            .and_then(|l| l.display_name)
            .unwrap_or_default();
        job.description = fields.description;
        job.url = fields.redirect_url;
        job.posted_at = fields
            .created
            .as_deref()
            .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
            .map(|dt| dt.with_timezone(&Utc));
        if fields.salary_min.is_some() || fields.salary_max.is_some() {
            job.salary = Some(SalaryRange {
                min: fields.salary_min,
                max: fields.salary_max,
                currency: Some("EUR".to_string()),
            });
        }
        job.employment_type = fields.contract_time.or(fields.contract_type);
        job.raw = raw;
        Some(job)
    }
}

#[async_trait]
impl JobProvider for AdzunaProvider {
    fn name(&self) -> &'static str {
        "adzuna"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Job>, ProviderError> {
        let url = format!("{}/{}/search/1", self.base_url, self.country);
        let mut params: Vec<(&str, String)> = vec![
            ("app_id", self.app_id.clone()),
            ("app_key", self.app_key.clone()),
            ("what", query.keywords.clone()),
            ("results_per_page", query.limit.to_string()),
            ("content-type", "application/json".to_string()),
        ];
        if let Some(location) = &query.location {
            params.push(("where", location.clone()));
        }
        if let Some(max_age) = query.max_age_days {
            params.push(("max_days_old", max_age.to_string()));
        }

        let request = self.client.get(&url).query(&params);
        let response = send_with_retry(request, self.backoff).await?;
        let response = error_for_status(response).await?;

        let body: AdzunaResponse = response.json().await?;
        let jobs: Vec<Job> = body
            .results
            .into_iter()
            .filter_map(|raw| self.map_job(raw))
            .take(query.limit)
            .collect();

        debug!(count = jobs.len(), keywords = %query.keywords, "adzuna search complete");
        Ok(jobs)
    }
}

#[derive(Debug, Deserialize)]
struct AdzunaResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AdzunaJob {
    title: Option<String>,
    company: Option<AdzunaCompany>,
    location: Option<AdzunaLocation>,
    description: Option<String>,
    redirect_url: Option<String>,
    created: Option<String>,
    salary_min: Option<f64>,
    salary_max: Option<f64>,
    contract_time: Option<String>,
    contract_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdzunaCompany {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdzunaLocation {
    display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RemoteFlag;

    fn provider_for(server: &mockito::ServerGuard) -> AdzunaProvider {
        AdzunaProvider::new(
            "test-id".to_string(),
            "test-key".to_string(),
            Duration::from_millis(5),
        )
        .with_base_url(server.url())
    }

    fn query() -> SearchQuery {
        SearchQuery {
            keywords: "Data Analyst".to_string(),
            location: Some("Berlin".to_string()),
            limit: 5,
            max_age_days: Some(7),
        }
    }

    const BODY: &str = r#"{
        "results": [
            {
                "title": "Data Analyst (m/w/d)",
                "company": {"display_name": "Acme GmbH"},
                "location": {"display_name": "Berlin, Deutschland"},
                "description": "SQL und Python.",
                "redirect_url": "https://adzuna.de/land/ad/123?utm_source=api",
                "created": "2024-05-01T09:30:00Z",
                "salary_min": 52000.0,
                "salary_max": 64000.0,
                "contract_time": "full_time"
            },
            {
                "company": {"display_name": "No Title Inc"}
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_search_maps_fields() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/de/search/1")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(BODY)
            .create_async()
            .await;

        let jobs = provider_for(&server).search(&query()).await.unwrap();
        assert_eq!(jobs.len(), 1, "untitled result must be skipped");

        let job = &jobs[0];
        assert_eq!(job.title, "Data Analyst (m/w/d)");
        assert_eq!(job.company, "Acme GmbH");
        assert_eq!(job.location, "Berlin, Deutschland");
        assert_eq!(job.platform, "adzuna");
        assert_eq!(job.remote, RemoteFlag::Unknown);
        assert_eq!(job.employment_type.as_deref(), Some("full_time"));
        assert!(job.posted_at.is_some());
        let salary = job.salary.as_ref().unwrap();
        assert_eq!(salary.min, Some(52000.0));
        assert_eq!(salary.currency.as_deref(), Some("EUR"));
        assert!(job.raw.get("redirect_url").is_some(), "raw payload retained");
    }

    #[tokio::test]
    async fn test_server_error_is_reported_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/de/search/1")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .expect(1)
            .create_async()
            .await;

        let err = provider_for(&server).search(&query()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 500, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_gets_exactly_one_retry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/de/search/1")
            .match_query(mockito::Matcher::Any)
            .with_status(429)
            .expect(2)
            .create_async()
            .await;

        let err = provider_for(&server).search(&query()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { retries: 1 }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_results_is_ok() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/de/search/1")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"results": []}"#)
            .create_async()
            .await;

        let jobs = provider_for(&server).search(&query()).await.unwrap();
        assert!(jobs.is_empty());
    }
}
