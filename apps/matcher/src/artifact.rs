//! Artifact persistence — the fitted ensemble and frozen feature schema
//! travel together as one opaque bincode bundle.
//!
//! Writes go to a sibling temp file first and are renamed into place, so a
//! crashed training run never leaves a half-written bundle behind.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::PipelineError;
use crate::features::schema::FeatureSchema;
use crate::ml::ensemble::ScoreModelEnsemble;

/// Everything inference needs, produced once by training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub ensemble: ScoreModelEnsemble,
    pub schema: FeatureSchema,
}

pub fn save(bundle: &ArtifactBundle, path: &Path) -> Result<(), PipelineError> {
    let bytes = bincode::serialize(bundle)
        .map_err(|e| PipelineError::Serialization(format!("failed to encode bundle: {e}")))?;

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &bytes).map_err(|e| {
        PipelineError::Artifact(format!("failed to write '{}': {e}", tmp_path.display()))
    })?;
    fs::rename(&tmp_path, path).map_err(|e| {
        PipelineError::Artifact(format!("failed to move bundle into '{}': {e}", path.display()))
    })?;

    info!(
        "saved model bundle to '{}' ({} bytes)",
        path.display(),
        bytes.len()
    );
    Ok(())
}

pub fn load(path: &Path) -> Result<ArtifactBundle, PipelineError> {
    let bytes = fs::read(path).map_err(|e| {
        PipelineError::Artifact(format!("model bundle '{}' unreadable: {e}", path.display()))
    })?;
    bincode::deserialize(&bytes).map_err(|e| {
        PipelineError::Artifact(format!("model bundle '{}' undecodable: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::builder::FeatureBuilder;
    use crate::ml::ensemble::{ParamGrid, SearchConfig};
    use crate::ml::forest::FeatureSubsample;
    use crate::model::records::{ExperienceSpan, JobRecord, Pair, ResumeRecord};

    fn train_tiny_bundle() -> (ArtifactBundle, Vec<Pair>) {
        let mut pairs = Vec::new();
        let mut targets = Vec::new();
        for i in 0..12 {
            let matched = i % 2 == 0;
            let job = JobRecord {
                role: "Backend Engineer".to_string(),
                description: "python sql backend services".to_string(),
                skills: vec!["python".to_string(), "sql".to_string()],
                required_experience: "3-5".to_string(),
                location: "remote".to_string(),
            };
            let resume = ResumeRecord {
                id: format!("r{i}"),
                summary: if matched {
                    "backend python developer".to_string()
                } else {
                    "florist and gardener".to_string()
                },
                skills: if matched {
                    vec!["python".to_string()]
                } else {
                    vec!["gardening".to_string()]
                },
                spans: vec![ExperienceSpan {
                    start: Some("01/2019".to_string()),
                    end: Some("01/2023".to_string()),
                }],
                education: "computer science".to_string(),
                location: "Berlin, Germany".to_string(),
            };
            pairs.push(Pair { job, resume });
            targets.push(if matched { [80.0; 6] } else { [15.0; 6] });
        }

        let (matrix, schema) = FeatureBuilder::fit(&pairs).unwrap();
        let config = SearchConfig {
            n_iter: 1,
            cv_folds: 2,
            report_cv_folds: 2,
            grid: ParamGrid {
                n_trees: vec![10],
                max_depth: vec![None],
                min_samples_split: vec![2],
                min_samples_leaf: vec![1],
                max_features: vec![FeatureSubsample::All],
            },
            ..Default::default()
        };
        let (ensemble, _) =
            crate::ml::ensemble::ScoreModelEnsemble::fit(&matrix.rows, &targets, &matrix.cols, &config)
                .unwrap();
        (ArtifactBundle { ensemble, schema }, pairs)
    }

    #[test]
    fn test_round_trip_preserves_schema_and_predictions() {
        let (bundle, pairs) = train_tiny_bundle();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");

        save(&bundle, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.schema.feature_cols, bundle.schema.feature_cols);
        assert_eq!(loaded.schema.skills, bundle.schema.skills);
        assert_eq!(loaded.schema.keywords, bundle.schema.keywords);

        let matrix = FeatureBuilder::replay(&pairs, &loaded.schema).unwrap();
        let before = bundle.ensemble.predict(&matrix.rows).unwrap();
        let after = loaded.ensemble.predict(&matrix.rows).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_missing_bundle_is_artifact_error() {
        let err = load(Path::new("/nonexistent/model.bin")).unwrap_err();
        assert!(matches!(err, PipelineError::Artifact(_)));
    }

    #[test]
    fn test_corrupt_bundle_is_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"definitely not bincode").unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Artifact(_)));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let (bundle, _) = train_tiny_bundle();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        save(&bundle, &path).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }
}
