//! The frozen feature schema — produced once at the end of training,
//! read-only for every inference call afterwards.
//!
//! Replay feature columns must equal training feature columns, by name and
//! order, every time. Everything needed to guarantee that lives here: the
//! skill vocabulary, the final column list, both fitted text scorers, the
//! fitted mean imputer, and the mined keyword set.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::features::text::TfidfScorer;

/// Frozen feature-engineering state shared between training and replay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Union of every skill seen across job and résumé fields during
    /// training, sorted and deduplicated. The sorted order is the stable
    /// enumeration the skill-indicator columns are keyed by.
    pub skills: Vec<String>,
    /// Canonical feature column names, in the exact order captured at
    /// training time.
    pub feature_cols: Vec<String>,
    /// Role/description vs résumé-summary similarity, fit on job texts.
    pub role_scorer: TfidfScorer,
    /// Job-role vs education-description similarity, fit on the union of
    /// job-role and résumé-education texts.
    pub edu_scorer: TfidfScorer,
    /// Per-column mean fill values, in `feature_cols` order.
    pub imputer: MeanImputer,
    /// Top-frequency terms mined from training job text (length > 3).
    pub keywords: BTreeSet<String>,
}

/// Per-column mean imputer. `fit` learns the fill values once; `apply`
/// replays them against any later matrix with the same column count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeanImputer {
    means: Vec<f64>,
}

impl MeanImputer {
    /// Learns per-column means over finite values. A column with no finite
    /// values gets a fill value of 0.
    pub fn fit(rows: &[Vec<f64>], n_cols: usize) -> Self {
        let mut means = vec![0.0; n_cols];
        for (col, mean) in means.iter_mut().enumerate() {
            let mut sum = 0.0;
            let mut count = 0usize;
            for row in rows {
                let value = row[col];
                if value.is_finite() {
                    sum += value;
                    count += 1;
                }
            }
            if count > 0 {
                *mean = sum / count as f64;
            }
        }
        MeanImputer { means }
    }

    pub fn n_cols(&self) -> usize {
        self.means.len()
    }

    /// Replaces every non-finite entry with the frozen column mean.
    /// A column-count mismatch is a schema error, not a data error.
    pub fn apply(&self, rows: &mut [Vec<f64>]) -> Result<(), PipelineError> {
        for row in rows.iter_mut() {
            if row.len() != self.means.len() {
                return Err(PipelineError::Schema(format!(
                    "imputer fitted on {} columns, row has {}",
                    self.means.len(),
                    row.len()
                )));
            }
            for (col, value) in row.iter_mut().enumerate() {
                if !value.is_finite() {
                    *value = self.means[col];
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_records_column_means() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 30.0]];
        let imputer = MeanImputer::fit(&rows, 2);
        let mut batch = vec![vec![f64::NAN, f64::NAN]];
        imputer.apply(&mut batch).unwrap();
        assert_eq!(batch[0], vec![2.0, 20.0]);
    }

    #[test]
    fn test_apply_uses_frozen_training_mean_not_batch_mean() {
        let imputer = MeanImputer::fit(&[vec![4.0], vec![6.0]], 1);
        let mut batch = vec![vec![100.0], vec![f64::NAN]];
        imputer.apply(&mut batch).unwrap();
        assert_eq!(batch[1][0], 5.0);
    }

    #[test]
    fn test_all_missing_column_fills_zero() {
        let imputer = MeanImputer::fit(&[vec![f64::NAN], vec![f64::NAN]], 1);
        let mut batch = vec![vec![f64::NAN]];
        imputer.apply(&mut batch).unwrap();
        assert_eq!(batch[0][0], 0.0);
    }

    #[test]
    fn test_column_count_mismatch_is_schema_error() {
        let imputer = MeanImputer::fit(&[vec![1.0, 2.0]], 2);
        let mut batch = vec![vec![1.0]];
        let err = imputer.apply(&mut batch).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn test_finite_values_left_untouched() {
        let imputer = MeanImputer::fit(&[vec![1.0], vec![3.0]], 1);
        let mut batch = vec![vec![7.5]];
        imputer.apply(&mut batch).unwrap();
        assert_eq!(batch[0][0], 7.5);
    }

    #[test]
    fn test_schema_serde_round_trip_preserves_state() {
        let schema = FeatureSchema {
            skills: vec!["python".to_string(), "sql".to_string()],
            feature_cols: vec!["job_has_python".to_string()],
            imputer: MeanImputer::fit(&[vec![2.0]], 1),
            ..Default::default()
        };
        let bytes = bincode::serialize(&schema).unwrap();
        let back: FeatureSchema = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.skills, schema.skills);
        assert_eq!(back.feature_cols, schema.feature_cols);
        assert_eq!(back.imputer.n_cols(), 1);
    }
}
