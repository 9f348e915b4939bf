//! Match categorization — maps a predicted composite match score to an
//! ordinal tier via fixed thresholds.
//!
//! Boundary rule: high iff score > 60, medium iff 40 ≤ score ≤ 60, low
//! otherwise. The training-side report code historically treated the
//! medium band as 40–60 inclusive while the deployed scorer used ≥ 40 with
//! the same upper bound; the two agree everywhere except dead code paths,
//! and the deployed rule is the one kept. 60 itself is medium.

use serde::{Deserialize, Serialize};

use crate::model::records::PredictionRow;

pub const MEDIUM_THRESHOLD: f64 = 40.0;
pub const HIGH_THRESHOLD: f64 = 60.0;

/// Ordinal match tier. Total function of the score: every float maps to
/// exactly one tier, including NaN (which compares false everywhere and
/// lands in Low).
pub fn categorize(match_score: f64) -> u8 {
    if match_score > HIGH_THRESHOLD {
        2
    } else if match_score >= MEDIUM_THRESHOLD {
        1
    } else {
        0
    }
}

/// Human-readable tier label, as printed in training reports.
pub fn tier_label(tier: u8) -> &'static str {
    match tier {
        2 => "High Match (>60%)",
        1 => "Medium Match (40-60%)",
        _ => "Low Match (<40%)",
    }
}

/// Per-tier summary over a batch of prediction rows, reported after
/// training for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierSummary {
    pub tier: u8,
    pub label: String,
    pub size: usize,
    pub avg_match_score: f64,
    pub high_match_percentage: f64,
}

/// Groups rows by tier and computes size / mean predicted match score /
/// high-match share for each non-empty tier, ascending.
pub fn summarize_tiers(rows: &[PredictionRow]) -> Vec<TierSummary> {
    let mut summaries = Vec::new();
    for tier in 0..=2u8 {
        let members: Vec<&PredictionRow> =
            rows.iter().filter(|r| r.match_category == tier).collect();
        if members.is_empty() {
            continue;
        }
        let size = members.len();
        let avg_match_score =
            members.iter().map(|r| r.match_score).sum::<f64>() / size as f64;
        let high = members.iter().filter(|r| r.match_category == 2).count();
        summaries.push(TierSummary {
            tier,
            label: tier_label(tier).to_string(),
            size,
            avg_match_score,
            high_match_percentage: high as f64 / size as f64 * 100.0,
        });
    }
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(score: f64) -> PredictionRow {
        let tier = categorize(score);
        PredictionRow {
            id: format!("r{score}"),
            skills_score: 0.0,
            experience_score: 0.0,
            location_score: 0.0,
            role_similarity: 0.0,
            education_score: 0.0,
            match_score: score,
            match_category: tier,
            cluster: tier,
        }
    }

    #[test]
    fn test_representative_scores() {
        assert_eq!(categorize(75.0), 2);
        assert_eq!(categorize(50.0), 1);
        assert_eq!(categorize(20.0), 0);
    }

    #[test]
    fn test_boundary_sixty_is_medium() {
        assert_eq!(categorize(60.0), 1);
        assert_eq!(categorize(60.0 + 1e-9), 2);
    }

    #[test]
    fn test_boundary_forty_is_medium() {
        assert_eq!(categorize(40.0), 1);
        assert_eq!(categorize(40.0 - 1e-9), 0);
    }

    #[test]
    fn test_extremes_and_nan_total() {
        assert_eq!(categorize(f64::INFINITY), 2);
        assert_eq!(categorize(f64::NEG_INFINITY), 0);
        assert_eq!(categorize(f64::NAN), 0);
    }

    #[test]
    fn test_tier_labels() {
        assert_eq!(tier_label(2), "High Match (>60%)");
        assert_eq!(tier_label(1), "Medium Match (40-60%)");
        assert_eq!(tier_label(0), "Low Match (<40%)");
    }

    #[test]
    fn test_summarize_groups_by_tier() {
        let rows = vec![row(75.0), row(80.0), row(50.0), row(10.0)];
        let summaries = summarize_tiers(&rows);
        assert_eq!(summaries.len(), 3);
        let high = summaries.iter().find(|s| s.tier == 2).unwrap();
        assert_eq!(high.size, 2);
        assert!((high.avg_match_score - 77.5).abs() < 1e-12);
        assert_eq!(high.high_match_percentage, 100.0);
        let low = summaries.iter().find(|s| s.tier == 0).unwrap();
        assert_eq!(low.high_match_percentage, 0.0);
    }

    #[test]
    fn test_summarize_skips_empty_tiers() {
        let summaries = summarize_tiers(&[row(75.0)]);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].tier, 2);
    }
}
