use serde::{Deserialize, Serialize};

/// Relative weights for the four ranking factors. All weights must be
/// non-negative and finite; they are treated as proportions and need not sum
/// to one. An all-zero set falls back to an equal-weight average at scoring
/// time rather than dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    pub keywords: f64,
    pub recency: f64,
    pub location: f64,
    pub completeness: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            keywords: 0.4,
            recency: 0.3,
            location: 0.2,
            completeness: 0.1,
        }
    }
}

impl RankingWeights {
    pub fn sum(&self) -> f64 {
        self.keywords + self.recency + self.location + self.completeness
    }

    /// True iff every weight is a finite, non-negative number.
    pub fn is_valid(&self) -> bool {
        [self.keywords, self.recency, self.location, self.completeness]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0)
    }
}

/// A named search configuration. The engine treats it as an immutable input
/// per call; its name keys the profile's seen-jobs memory in the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProfile {
    pub name: String,
    /// Role titles the keyword factor scores against.
    pub target_roles: Vec<String>,
    pub location: Option<String>,
    /// When set, a remote-flagged job counts as a location match regardless
    /// of its location text.
    pub remote_preferred: bool,
    #[serde(default)]
    pub weights: RankingWeights,
}

impl SearchProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_roles: Vec::new(),
            location: None,
            remote_preferred: false,
            weights: RankingWeights::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_are_valid() {
        assert!(RankingWeights::default().is_valid());
        assert!(RankingWeights::default().sum() > 0.0);
    }

    #[test]
    fn test_negative_weight_is_invalid() {
        let w = RankingWeights {
            keywords: -0.1,
            ..Default::default()
        };
        assert!(!w.is_valid());
    }

    #[test]
    fn test_nan_weight_is_invalid() {
        let w = RankingWeights {
            recency: f64::NAN,
            ..Default::default()
        };
        assert!(!w.is_valid());
    }

    #[test]
    fn test_all_zero_weights_are_valid_input() {
        let w = RankingWeights {
            keywords: 0.0,
            recency: 0.0,
            location: 0.0,
            completeness: 0.0,
        };
        assert!(w.is_valid());
        assert_eq!(w.sum(), 0.0);
    }
}
