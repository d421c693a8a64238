//! JSearch client (RapidAPI job aggregator).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::{Job, RemoteFlag, SalaryRange};

use super::{error_for_status, send_with_retry, JobProvider, ProviderError, SearchQuery};

const JSEARCH_API_URL: &str = "https://jsearch.p.rapidapi.com";
const RAPIDAPI_HOST: &str = "jsearch.p.rapidapi.com";

pub struct JSearchProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    backoff: Duration,
}

impl JSearchProvider {
    pub fn new(api_key: String, backoff: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: JSEARCH_API_URL.to_string(),
            backoff,
        }
    }

    /// Points the client at a different endpoint. Tests aim this at a mock
    /// server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn map_job(&self, raw: serde_json::Value) -> Option<Job> {
        let fields: JSearchJob = match serde_json::from_value(raw.clone()) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "skipping unmappable jsearch result");
                return None;
            }
        };

        let mut job = Job::new(
            fields.job_title?,
            fields.employer_name.unwrap_or_default(),
            "jsearch",
        );
        job.location = match (fields.job_city, fields.job_country) {
            (Some(city), Some(country)) => format!("{city}, {country}"),
            (Some(city), None) => city,
            (None, Some(country)) => country,
            (None, None) => String::new(),
        };
        job.description = fields.job_description;
        job.url = fields.job_apply_link;
        job.posted_at = fields
            .job_posted_at_datetime_utc
            .as_deref()
            .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
            .map(|dt| dt.with_timezone(&Utc));
        if fields.job_min_salary.is_some() || fields.job_max_salary.is_some() {
            job.salary = Some(SalaryRange {
                min: fields.job_min_salary,
                max: fields.job_max_salary,
                currency: fields.job_salary_currency,
            });
        }
        job.remote = match fields.job_is_remote {
            Some(true) => RemoteFlag::Yes,
            Some(false) => RemoteFlag::No,
            None => RemoteFlag::Unknown,
        };
        job.employment_type = fields.job_employment_type;
        job.raw = raw;
        Some(job)
    }
}

/// JSearch filters by posting age through fixed buckets, not day counts.
fn date_posted_bucket(max_age_days: u32) -> &'static str {
    match max_age_days {
        0..=1 => "today",
        2..=3 => "3days",
        4..=7 => "week",
        8..=30 => "month",
        _ => "all",
    }
}

#[async_trait]
impl JobProvider for JSearchProvider {
    fn name(&self) -> &'static str {
        "jsearch"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Job>, ProviderError> {
        // JSearch takes the location inline in the query string.
        let q = match &query.location {
            Some(location) => format!("{} in {}", query.keywords, location),
            None => query.keywords.clone(),
        };
        let mut params: Vec<(&str, String)> = vec![
            ("query", q),
            ("page", "1".to_string()),
            ("num_pages", "1".to_string()),
        ];
        if let Some(max_age) = query.max_age_days {
            params.push(("date_posted", date_posted_bucket(max_age).to_string()));
        }

        let request = self
            .client
            .get(format!("{}/search", self.base_url))
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", RAPIDAPI_HOST)
            .query(&params);
        let response = send_with_retry(request, self.backoff).await?;
        let response = error_for_status(response).await?;

        let body: JSearchResponse = response.json().await?;
        let jobs: Vec<Job> = body
            .data
            .into_iter()
            .filter_map(|raw| self.map_job(raw))
            .take(query.limit)
            .collect();

        debug!(count = jobs.len(), keywords = %query.keywords, "jsearch search complete");
        Ok(jobs)
    }
}

#[derive(Debug, Deserialize)]
struct JSearchResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct JSearchJob {
    job_title: Option<String>,
    employer_name: Option<String>,
    job_city: Option<String>,
    job_country: Option<String>,
    job_description: Option<String>,
    job_apply_link: Option<String>,
    job_posted_at_datetime_utc: Option<String>,
    job_min_salary: Option<f64>,
    job_max_salary: Option<f64>,
    job_salary_currency: Option<String>,
    job_is_remote: Option<bool>,
    job_employment_type: Option<String>,
}
