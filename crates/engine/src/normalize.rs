//! Canonical forms for job identity and fuzzy matching.
//!
//! Everything here is deterministic and side-effect-free. `compute_identifier`
//! is the single dedup key for the whole engine: every "already seen" decision
//! goes through it, so the rules in this module may not be reimplemented
//! elsewhere.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

use crate::models::Job;

/// Query parameters that only carry click tracking and never identify a
/// posting.
const TRACKING_PARAMS: &[&str] = &[
    "utm", "fbclid", "gclid", "msclkid", "ref", "source", "src", "trk", "tracking", "cmpid",
    "mc_cid", "mc_eid",
];

/// Query parameters some job boards use to wrap the real posting URL in a
/// click-through redirector.
const REDIRECT_PARAMS: &[&str] = &["url", "u", "redirect", "redirect_url", "target", "dest"];

const MAX_REDIRECT_DEPTH: usize = 3;

fn gender_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "(m/w/d)", "(w/m/x)", "(m/f/d)" and the spelled-out forms.
    RE.get_or_init(|| {
        Regex::new(r"\(\s*[mwfdxh](\s*/\s*[mwfdxh]){1,2}\s*\)|\ball\s+genders?\b|\balle\s+geschlechter\b")
            .expect("gender marker regex")
    })
}

fn gender_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "entwickler:in", "entwickler*innen", "entwickler_in", "entwickler/-in"
    RE.get_or_init(|| Regex::new(r"(?:[:*_]|/-?)(?:innen|in)\b").expect("gender suffix regex"))
}

/// Canonicalizes a posting URL for identity comparison.
///
/// Recognized http(s) URLs get their fragment dropped, tracking parameters
/// stripped, redirector wrappers unwrapped, and trailing slashes removed; the
/// `url` crate lowercases scheme and host on parse. Anything that is not a
/// URL (some providers key postings by opaque ids) comes back lowercase and
/// trimmed, unchanged otherwise.
pub fn normalize_url(raw: &str) -> String {
    normalize_url_depth(raw, 0)
}

fn normalize_url_depth(raw: &str, depth: usize) -> String {
    let trimmed = raw.trim();
    let parsed = match Url::parse(trimmed) {
        Ok(u) if is_web_url(&u) => u,
        _ => return trimmed.to_lowercase(),
    };

    // Unwrap a redirector before doing anything else: the wrapped target is
    // the real posting.
    if depth < MAX_REDIRECT_DEPTH {
        for (key, value) in parsed.query_pairs() {
            if REDIRECT_PARAMS.contains(&key.to_lowercase().as_str()) {
                if let Ok(inner) = Url::parse(&value) {
                    if is_web_url(&inner) {
                        return normalize_url_depth(&value, depth + 1);
                    }
                }
            }
        }
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut out = format!(
        "{}://{}",
        parsed.scheme(),
        parsed.host_str().unwrap_or_default()
    );
    if let Some(port) = parsed.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    let path = parsed.path().trim_end_matches('/');
    out.push_str(path);
    if !kept.is_empty() {
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish();
        out.push('?');
        out.push_str(&query);
    }
    out
}

fn is_web_url(u: &Url) -> bool {
    (u.scheme() == "http" || u.scheme() == "https") && u.host_str().is_some()
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Canonicalizes free text (titles, company names, locations, queries) for
/// matching: lowercase, gendered-suffix markers removed, punctuation stripped,
/// whitespace collapsed.
pub fn normalize_text(s: &str) -> String {
    let lower = s.to_lowercase();
    let no_markers = gender_marker_re().replace_all(&lower, " ");
    let no_suffixes = gender_suffix_re().replace_all(&no_markers, "");
    let cleaned: String = no_suffixes
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fuzzy match ratio in [0, 1] over normalized text: the better of token
/// overlap (handles word reordering) and normalized edit distance (handles
/// small spelling differences). For fuzzy detection only; identifier
/// equality never uses this.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize_text(a);
    let b = normalize_text(b);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let ta: HashSet<&str> = a.split(' ').collect();
    let tb: HashSet<&str> = b.split(' ').collect();
    let intersection = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    let jaccard = if union > 0.0 { intersection / union } else { 0.0 };

    let edit = strsim::normalized_levenshtein(&a, &b);
    jaccard.max(edit).clamp(0.0, 1.0)
}

/// Derives the canonical identifier for a job.
///
/// A valid posting URL wins; otherwise the identifier is a content hash of
/// the normalized title and company. Total and stable: identical input always
/// produces the identical identifier.
pub fn compute_identifier(job: &Job) -> String {
    if let Some(url) = job.url.as_deref() {
        if let Ok(parsed) = Url::parse(url.trim()) {
            if is_web_url(&parsed) {
                return normalize_url(url);
            }
        }
    }
    let basis = format!(
        "{}|{}",
        normalize_text(&job.title),
        normalize_text(&job.company)
    );
    let mut hasher = Sha256::new();
    hasher.update(basis.as_bytes());
    hex::encode(hasher.finalize())
}

/// The suppression key for a (keywords, location) pair. Two searches with the
/// same key for the same profile inside the suppression window are redundant.
pub fn query_key(keywords: &str, location: Option<&str>) -> String {
    format!(
        "{}|{}",
        normalize_text(keywords),
        normalize_text(location.unwrap_or(""))
    )
}
