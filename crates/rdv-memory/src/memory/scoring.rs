//! Relevance Scoring
//!
//! Search ranks matches by a weighted sum of three normalised signals:
//! - importance, as stored (already in [0, 1])
//! - recency, `created_at` rescaled over the matching set
//! - access frequency, `access_count` relative to the most accessed match
//!
//! Every weight is strictly positive, so raising any one signal while the
//! others stay fixed always raises the score.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weights for the relevance score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceWeights {
    pub importance: f64,
    pub recency: f64,
    pub access: f64,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            importance: 0.5,
            recency: 0.3,
            access: 0.2,
        }
    }
}

impl RelevanceWeights {
    /// Name of the first weight that is not strictly positive and finite
    pub(crate) fn first_invalid(&self) -> Option<&'static str> {
        [
            ("importance", self.importance),
            ("recency", self.recency),
            ("access", self.access),
        ]
        .into_iter()
        .find(|(_, w)| !(w.is_finite() && *w > 0.0))
        .map(|(name, _)| name)
    }
}

/// Signals for one candidate
#[derive(Debug, Clone, Copy)]
pub struct Signals {
    pub importance: f64,
    pub created_at: DateTime<Utc>,
    pub access_count: u64,
    /// Insertion sequence, used as the last tiebreak
    pub seq: u64,
}

/// Score every candidate and return `(index, score)` pairs, best first.
///
/// Ties break by recency (newer first), then by insertion order (later first).
pub fn rank(candidates: &[Signals], weights: &RelevanceWeights) -> Vec<(usize, f64)> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let oldest = candidates.iter().map(|c| c.created_at).min().unwrap_or_default();
    let newest = candidates.iter().map(|c| c.created_at).max().unwrap_or_default();
    let span_ms = (newest - oldest).num_milliseconds() as f64;
    let max_access = candidates.iter().map(|c| c.access_count).max().unwrap_or(0);

    let mut scored: Vec<(usize, f64)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let recency = if span_ms > 0.0 {
                (c.created_at - oldest).num_milliseconds() as f64 / span_ms
            } else {
                1.0
            };
            let access = if max_access > 0 {
                c.access_count as f64 / max_access as f64
            } else {
                0.0
            };
            let score = weights.importance * c.importance
                + weights.recency * recency
                + weights.access * access;
            (i, score)
        })
        .collect();

    scored.sort_by(|(ia, sa), (ib, sb)| {
        sb.partial_cmp(sa)
            .unwrap_or(Ordering::Equal)
            .then_with(|| candidates[*ib].created_at.cmp(&candidates[*ia].created_at))
            .then_with(|| candidates[*ib].seq.cmp(&candidates[*ia].seq))
    });

    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn signals(importance: f64, age_secs: i64, access_count: u64, seq: u64) -> Signals {
        Signals {
            importance,
            created_at: Utc::now() - Duration::seconds(age_secs),
            access_count,
            seq,
        }
    }

    #[test]
    fn test_importance_raises_score() {
        let base = Utc::now();
        let a = Signals { importance: 0.2, created_at: base, access_count: 0, seq: 0 };
        let b = Signals { importance: 0.9, created_at: base, access_count: 0, seq: 1 };
        let ranked = rank(&[a, b], &RelevanceWeights::default());
        assert_eq!(ranked[0].0, 1);
        assert!(ranked[0].1 > ranked[1].1);
    }

    #[test]
    fn test_recency_raises_score() {
        let ranked = rank(
            &[signals(0.5, 100, 0, 0), signals(0.5, 1, 0, 1)],
            &RelevanceWeights::default(),
        );
        assert_eq!(ranked[0].0, 1);
    }

    #[test]
    fn test_access_raises_score() {
        let base = Utc::now();
        let a = Signals { importance: 0.5, created_at: base, access_count: 7, seq: 0 };
        let b = Signals { importance: 0.5, created_at: base, access_count: 1, seq: 1 };
        let ranked = rank(&[a, b], &RelevanceWeights::default());
        assert_eq!(ranked[0].0, 0);
    }

    #[test]
    fn test_tie_breaks_by_recency_then_sequence() {
        let base = Utc::now();
        let a = Signals { importance: 0.5, created_at: base, access_count: 0, seq: 0 };
        let b = Signals { importance: 0.5, created_at: base, access_count: 0, seq: 1 };
        let ranked = rank(&[a, b], &RelevanceWeights::default());
        assert_eq!(ranked[0].0, 1);
        assert_eq!(ranked[0].1, ranked[1].1);
    }

    #[test]
    fn test_empty_candidates() {
        assert!(rank(&[], &RelevanceWeights::default()).is_empty());
    }

    #[test]
    fn test_weight_validation() {
        assert_eq!(RelevanceWeights::default().first_invalid(), None);
        let weights = RelevanceWeights { recency: 0.0, ..Default::default() };
        assert_eq!(weights.first_invalid(), Some("recency"));
        let weights = RelevanceWeights { access: f64::NAN, ..Default::default() };
        assert_eq!(weights.first_invalid(), Some("access"));
    }
}
