//! Deterministic multi-factor job scoring.
//!
//! Every factor is normalized to [0, 1] before weighting, so the weights in
//! a profile stay comparable proportions no matter how the underlying
//! signals are computed. Fuzzy matches degrade the score; they never drop a
//! job. Filtering below a relevance floor is the caller's call.

use chrono::{DateTime, Utc};

use crate::models::{Job, RankedJob, RemoteFlag, SearchProfile};
use crate::normalize::{normalize_text, similarity};

/// Score a description only counts toward completeness once it is long
/// enough to feed letter generation.
const DESCRIPTION_LENGTH_THRESHOLD: usize = 200;

/// Recency factor for postings without a date: neutral, deliberately neither
/// penalized to 0 nor trusted at 1.
const UNKNOWN_RECENCY: f64 = 0.5;

const REGION_PARTIAL_CREDIT: f64 = 0.5;

/// Stateless scorer. The decay ceiling comes from configuration (see
/// `EngineConfig::recency_max_age_days`).
#[derive(Debug, Clone)]
pub struct RankingEngine {
    recency_max_age_days: f64,
}

impl RankingEngine {
    pub fn new(recency_max_age_days: f64) -> Self {
        Self {
            recency_max_age_days,
        }
    }

    /// Scores and orders jobs for a profile. Ordering is total: score
    /// descending, then newer posting first (undated last), then identifier,
    /// so identical inputs always produce identical output.
    pub fn rank(&self, jobs: Vec<Job>, profile: &SearchProfile) -> Vec<RankedJob> {
        self.rank_at(jobs, profile, Utc::now())
    }

    /// The pure core of `rank`: recency is computed against the supplied
    /// clock, making the whole ranking a function of its arguments.
    pub fn rank_at(
        &self,
        jobs: Vec<Job>,
        profile: &SearchProfile,
        now: DateTime<Utc>,
    ) -> Vec<RankedJob> {
        let mut scored: Vec<(Job, f64)> = jobs
            .into_iter()
            .map(|job| {
                let score = self.score(&job, profile, now);
                (job, score)
            })
            .collect();

        scored.sort_by(|(ja, sa), (jb, sb)| {
            sb.total_cmp(sa)
                .then_with(|| jb.posted_at.cmp(&ja.posted_at))
                .then_with(|| ja.identifier.cmp(&jb.identifier))
        });

        scored
            .into_iter()
            .enumerate()
            .map(|(i, (job, score))| RankedJob {
                job,
                score,
                rank: i + 1,
            })
            .collect()
    }

    fn score(&self, job: &Job, profile: &SearchProfile, now: DateTime<Utc>) -> f64 {
        let factors = [
            (profile.weights.keywords, keyword_factor(job, profile)),
            (profile.weights.recency, self.recency_factor(job, now)),
            (profile.weights.location, location_factor(job, profile)),
            (profile.weights.completeness, completeness_factor(job)),
        ];

        let weight_sum: f64 = factors.iter().map(|(w, _)| w).sum();
        if weight_sum > 0.0 {
            factors.iter().map(|(w, f)| w * f).sum::<f64>() / weight_sum
        } else {
            // All-zero weights: equal-weight average instead of dividing by
            // zero.
            factors.iter().map(|(_, f)| f).sum::<f64>() / factors.len() as f64
        }
    }

    /// Linear decay from 1.0 at posting time to 0.0 at the configured
    /// ceiling, clamped beyond it.
    fn recency_factor(&self, job: &Job, now: DateTime<Utc>) -> f64 {
        let Some(posted_at) = job.posted_at else {
            return UNKNOWN_RECENCY;
        };
        if self.recency_max_age_days <= 0.0 {
            return 0.0;
        }
        let age_days = now.signed_duration_since(posted_at).num_seconds() as f64 / 86_400.0;
        (1.0 - age_days.max(0.0) / self.recency_max_age_days).clamp(0.0, 1.0)
    }
}

/// Best title match across the profile's target roles: containment of the
/// normalized role counts as exact, anything else falls back to fuzzy
/// similarity.
fn keyword_factor(job: &Job, profile: &SearchProfile) -> f64 {
    let title = normalize_text(&job.title);
    profile
        .target_roles
        .iter()
        .map(|role| {
            let role_norm = normalize_text(role);
            if !role_norm.is_empty() && title.contains(&role_norm) {
                1.0
            } else {
                similarity(&job.title, role)
            }
        })
        .fold(0.0_f64, f64::max)
        .clamp(0.0, 1.0)
}

fn location_factor(job: &Job, profile: &SearchProfile) -> f64 {
    if profile.remote_preferred && job.remote == RemoteFlag::Yes {
        return 1.0;
    }
    let Some(wanted) = profile.location.as_deref() else {
        // No preference: everything is a match.
        return 1.0;
    };
    let wanted = normalize_text(wanted);
    let actual = normalize_text(&job.location);
    if wanted.is_empty() {
        return 1.0;
    }
    if actual.is_empty() {
        return 0.0;
    }
    if actual == wanted || actual.contains(&wanted) || wanted.contains(&actual) {
        return 1.0;
    }
    // Same region: the location strings share at least one token.
    let shares_token = wanted
        .split(' ')
        .any(|t| actual.split(' ').any(|a| a == t));
    if shares_token {
        REGION_PARTIAL_CREDIT
    } else {
        0.0
    }
}

/// Fraction of the optional fields downstream content-building cares about:
/// a substantial description, a salary, an employment type.
fn completeness_factor(job: &Job) -> f64 {
    let mut present = 0;
    if job
        .description
        .as_deref()
        .map(|d| d.len() >= DESCRIPTION_LENGTH_THRESHOLD)
        .unwrap_or(false)
    {
        present += 1;
    }
    if job.salary.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        present += 1;
    }
    if job.employment_type.is_some() {
        present += 1;
    }
    present as f64 / 3.0
}
