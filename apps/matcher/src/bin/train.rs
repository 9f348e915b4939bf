//! Offline training entry point. Reads a historical matching dataset from
//! CSV (path as the first argument, `dataset.csv` by default), fits the
//! feature schema and the per-target forest ensemble, prints the metric
//! report, and writes the model bundle to `MODEL_PATH`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matcher::artifact::{self, ArtifactBundle};
use matcher::categorize::{categorize, summarize_tiers};
use matcher::config::Config;
use matcher::features::builder::FeatureBuilder;
use matcher::ml::ensemble::{ScoreModelEnsemble, SearchConfig, TargetReport};
use matcher::model::records::{ExperienceSpan, JobRecord, Pair, PredictionRow, ResumeRecord};

/// One row of the training CSV. Skills columns hold semicolon-separated
/// lists; the six score columns are optional so unscored rows can be
/// detected and dropped.
#[derive(Debug, Deserialize)]
struct TrainRow {
    #[serde(rename = "jobRole", default)]
    job_role: String,
    #[serde(rename = "jobDescription", default)]
    job_description: String,
    #[serde(rename = "jobSkills", default)]
    job_skills: String,
    #[serde(rename = "requiredExperience", default)]
    required_experience: String,
    #[serde(rename = "jobLocation", default)]
    job_location: String,
    #[serde(rename = "resumeSummary", default)]
    resume_summary: String,
    #[serde(rename = "resumeSkills", default)]
    resume_skills: String,
    #[serde(rename = "resumeExperience__startDate")]
    start_date: Option<String>,
    #[serde(rename = "resumeExperience__endDate")]
    end_date: Option<String>,
    #[serde(rename = "resumeEducation__description", default)]
    education: String,
    #[serde(rename = "resumeLocation", default)]
    resume_location: String,
    #[serde(rename = "skillsScore")]
    skills_score: Option<f64>,
    #[serde(rename = "experienceScore")]
    experience_score: Option<f64>,
    #[serde(rename = "locationScore")]
    location_score: Option<f64>,
    #[serde(rename = "roleSimilarity")]
    role_similarity: Option<f64>,
    #[serde(rename = "educationScore")]
    education_score: Option<f64>,
    #[serde(rename = "matchScore")]
    match_score: Option<f64>,
}

impl TrainRow {
    /// All six targets, or `None` if any score column is blank.
    fn targets(&self) -> Option<[f64; 6]> {
        Some([
            self.skills_score?,
            self.experience_score?,
            self.location_score?,
            self.role_similarity?,
            self.education_score?,
            self.match_score?,
        ])
    }
}

fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(config.log_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let dataset: PathBuf = std::env::args_os()
        .nth(1)
        .map(Into::into)
        .unwrap_or_else(|| PathBuf::from("dataset.csv"));
    info!("loading training data from {}", dataset.display());

    let rows = load_rows(&dataset)?;
    let (pairs, targets) = build_pairs(rows);
    info!("{} scored training pairs", pairs.len());

    info!("fitting feature schema and score models");
    let (matrix, schema) = FeatureBuilder::fit(&pairs)?;
    let (ensemble, reports) =
        ScoreModelEnsemble::fit(&matrix.rows, &targets, &matrix.cols, &SearchConfig::default())?;

    for report in &reports {
        log_report(report);
    }
    log_tier_summary(&ensemble, &pairs, &matrix.rows)?;

    artifact::save(&ArtifactBundle { ensemble, schema }, &config.model_path)?;
    Ok(())
}

fn load_rows(dataset: &std::path::Path) -> Result<Vec<TrainRow>> {
    let mut reader = csv::Reader::from_path(dataset)
        .with_context(|| format!("could not open dataset '{}'", dataset.display()))?;

    let mut rows = Vec::new();
    let mut dropped = 0usize;
    for record in reader.deserialize() {
        let row: TrainRow = record.context("malformed dataset row")?;
        if row.targets().is_some() {
            rows.push(row);
        } else {
            dropped += 1;
        }
    }
    if dropped > 0 {
        info!("dropped {dropped} rows with missing score columns");
    }
    Ok(rows)
}

/// Builds training pairs. Experience spans are aggregated per candidate
/// (keyed by professional summary) first, so every pair for a candidate
/// carries that candidate's full work history, exactly as inference does.
fn build_pairs(rows: Vec<TrainRow>) -> (Vec<Pair>, Vec<[f64; 6]>) {
    let mut spans_by_candidate: BTreeMap<String, Vec<ExperienceSpan>> = BTreeMap::new();
    for row in &rows {
        if row.start_date.is_some() || row.end_date.is_some() {
            spans_by_candidate
                .entry(row.resume_summary.clone())
                .or_default()
                .push(ExperienceSpan {
                    start: row.start_date.clone(),
                    end: row.end_date.clone(),
                });
        }
    }

    let mut pairs = Vec::with_capacity(rows.len());
    let mut targets = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let Some(scores) = row.targets() else { continue };
        pairs.push(Pair {
            job: JobRecord {
                role: row.job_role.clone(),
                description: row.job_description.clone(),
                skills: split_skills(&row.job_skills),
                required_experience: row.required_experience.clone(),
                location: row.job_location.clone(),
            },
            resume: ResumeRecord {
                id: format!("row_{index}"),
                summary: row.resume_summary.clone(),
                skills: split_skills(&row.resume_skills),
                spans: spans_by_candidate
                    .get(&row.resume_summary)
                    .cloned()
                    .unwrap_or_default(),
                education: row.education.clone(),
                location: row.resume_location.clone(),
            },
        });
        targets.push(scores);
    }
    (pairs, targets)
}

fn split_skills(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn log_report(report: &TargetReport) {
    info!(
        "{}: MAE {:.2} | RMSE {:.2} | R2 {:.2} | MAPE {:.2}% | CV R2 {:.2} (+/- {:.2})",
        report.target, report.mae, report.rmse, report.r2, report.mape,
        report.cv_r2_mean, report.cv_r2_std
    );
    for (name, weight) in report.feature_importance.iter().take(5) {
        info!("  {name}: {weight:.4}");
    }
}

/// Scores the training pairs with the freshly fitted ensemble and prints
/// the tier distribution of predicted match scores.
fn log_tier_summary(
    ensemble: &ScoreModelEnsemble,
    pairs: &[Pair],
    x: &[Vec<f64>],
) -> Result<()> {
    let predictions = ensemble.predict(x)?;
    let prediction_rows: Vec<PredictionRow> = pairs
        .iter()
        .enumerate()
        .map(|(i, pair)| {
            let score = |target: &str| predictions[target][i];
            let match_score = score("matchScore");
            let tier = categorize(match_score);
            PredictionRow {
                id: pair.resume.id.clone(),
                skills_score: score("skillsScore"),
                experience_score: score("experienceScore"),
                location_score: score("locationScore"),
                role_similarity: score("roleSimilarity"),
                education_score: score("educationScore"),
                match_score,
                match_category: tier,
                cluster: tier,
            }
        })
        .collect();

    for summary in summarize_tiers(&prediction_rows) {
        info!(
            "tier {} ({}): {} candidates | avg match {:.1} | {:.1}% high match",
            summary.tier,
            summary.label,
            summary.size,
            summary.avg_match_score,
            summary.high_match_percentage
        );
    }
    Ok(())
}
