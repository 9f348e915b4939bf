//! Feature builder — converts (job, résumé) pairs into the fixed-width
//! numeric feature matrix.
//!
//! Training and replay run the exact same per-pair computation
//! (`compute_row`); the only mode difference is who owns the schema.
//! Training learns the vocabulary, text scorers, keyword set, column order,
//! and imputer, then freezes them. Replay treats the schema as read-only
//! and must reproduce the training columns by name and order or abort.
//!
//! Failure policy: a single bad record degrades its offending features to a
//! default and the batch continues. The one hard abort is a schema
//! mismatch, because that means the persisted artifact is incompatible with
//! the current builder logic.

use std::collections::{BTreeSet, HashMap};

use tracing::warn;

use crate::errors::PipelineError;
use crate::features::dates::resolve_span;
use crate::features::schema::{FeatureSchema, MeanImputer};
use crate::features::text::TfidfScorer;
use crate::model::records::Pair;

/// Vocabulary sizes and keyword budget, matching the trained artifact line.
const ROLE_VOCAB_SIZE: usize = 500;
const EDU_VOCAB_SIZE: usize = 300;
const KEYWORD_BUDGET: usize = 50;
const KEYWORD_MIN_LEN: usize = 4;

/// The six base numeric columns, in canonical order.
const BASE_COLS: [&str; 6] = [
    "required_years",
    "actual_experience",
    "experience_match",
    "location_match",
    "role_similarity",
    "education_similarity",
];

/// The seven derived interaction/nonlinear columns, in canonical order.
const DERIVED_COLS: [&str; 7] = [
    "skill_experience_interaction",
    "experience_match_squared",
    "role_similarity_squared",
    "skill_match_ratio",
    "skill_coverage_ratio",
    "keyword_match_count",
    "composite_feature",
];

/// A dense feature matrix with its column names. `cols` always equals the
/// schema's `feature_cols` once a build completes.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub cols: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Training-mode build: learns the schema from `pairs`, computes the
    /// feature matrix, fits the imputer, and freezes the column order.
    pub fn fit(pairs: &[Pair]) -> Result<(FeatureMatrix, FeatureSchema), PipelineError> {
        if pairs.is_empty() {
            return Err(PipelineError::Input(
                "cannot fit feature schema on an empty pair set".to_string(),
            ));
        }

        let mut schema = learn_schema(pairs);
        let cols = column_order(&schema.skills);

        let maps: Vec<HashMap<String, f64>> =
            pairs.iter().map(|p| compute_row(p, &schema)).collect();
        let mut rows = project_rows(&maps, &cols);

        let imputer = MeanImputer::fit(&rows, cols.len());
        imputer.apply(&mut rows)?;

        schema.feature_cols = cols.clone();
        schema.imputer = imputer;

        Ok((FeatureMatrix { cols, rows }, schema))
    }

    /// Replay-mode build against a frozen schema. Reproduces the training
    /// columns exactly, synthesizing any absent column as all-zero, and
    /// aborts only on an unrecoverable schema mismatch.
    pub fn replay(
        pairs: &[Pair],
        schema: &FeatureSchema,
    ) -> Result<FeatureMatrix, PipelineError> {
        if schema.feature_cols.is_empty() {
            return Err(PipelineError::Schema(
                "frozen schema has no feature columns".to_string(),
            ));
        }
        if schema.imputer.n_cols() != schema.feature_cols.len() {
            return Err(PipelineError::Schema(format!(
                "imputer covers {} columns but schema names {}",
                schema.imputer.n_cols(),
                schema.feature_cols.len()
            )));
        }

        let maps: Vec<HashMap<String, f64>> =
            pairs.iter().map(|p| compute_row(p, schema)).collect();
        let mut rows = project_rows(&maps, &schema.feature_cols);

        for row in &rows {
            if row.len() != schema.feature_cols.len() {
                return Err(PipelineError::Schema(format!(
                    "replay produced {} columns, schema expects {}",
                    row.len(),
                    schema.feature_cols.len()
                )));
            }
        }

        schema.imputer.apply(&mut rows)?;

        Ok(FeatureMatrix {
            cols: schema.feature_cols.clone(),
            rows,
        })
    }
}

/// Canonical column order: per-skill indicator pairs in vocabulary order,
/// then the base numerics, then the derived columns.
fn column_order(skills: &[String]) -> Vec<String> {
    let mut cols = Vec::with_capacity(skills.len() * 2 + BASE_COLS.len() + DERIVED_COLS.len());
    for skill in skills {
        cols.push(format!("job_has_{skill}"));
        cols.push(format!("resume_has_{skill}"));
    }
    cols.extend(BASE_COLS.iter().map(|c| c.to_string()));
    cols.extend(DERIVED_COLS.iter().map(|c| c.to_string()));
    cols
}

/// Learns the training-derived half of the schema: skill vocabulary, both
/// text scorers, and the keyword set. `feature_cols` and the imputer are
/// filled in by `fit` after the matrix exists.
fn learn_schema(pairs: &[Pair]) -> FeatureSchema {
    let mut skills: BTreeSet<String> = BTreeSet::new();
    for pair in pairs {
        skills.extend(pair.job.skills.iter().cloned());
        skills.extend(pair.resume.skills.iter().cloned());
    }

    let job_texts: Vec<String> = pairs.iter().map(|p| job_text(p)).collect();

    let mut edu_corpus: Vec<String> = pairs.iter().map(|p| p.job.role.clone()).collect();
    edu_corpus.extend(pairs.iter().map(|p| p.resume.education.clone()));

    FeatureSchema {
        skills: skills.into_iter().collect(),
        feature_cols: Vec::new(),
        role_scorer: TfidfScorer::fit(&job_texts, ROLE_VOCAB_SIZE),
        edu_scorer: TfidfScorer::fit(&edu_corpus, EDU_VOCAB_SIZE),
        imputer: MeanImputer::default(),
        keywords: mine_keywords(&job_texts),
    }
}

/// Top-frequency job-text terms: take the `KEYWORD_BUDGET` most common
/// whitespace tokens (ties broken lexicographically), then keep only those
/// longer than three characters.
fn mine_keywords(job_texts: &[String]) -> BTreeSet<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for text in job_texts {
        for word in text.to_lowercase().split_whitespace() {
            *counts.entry(word.to_string()).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(KEYWORD_BUDGET)
        .filter(|(word, _)| word.len() >= KEYWORD_MIN_LEN)
        .map(|(word, _)| word)
        .collect()
}

fn job_text(pair: &Pair) -> String {
    format!("{} {}", pair.job.role, pair.job.description)
}

/// The shared per-pair feature computation, identical in both modes.
fn compute_row(pair: &Pair, schema: &FeatureSchema) -> HashMap<String, f64> {
    let mut row: HashMap<String, f64> = HashMap::new();

    // Skill indicator columns over the frozen vocabulary. Skills unseen in
    // training are invisible here; that loss is intentional.
    let mut job_skill_count = 0.0;
    let mut resume_skill_count = 0.0;
    let mut skill_match_count = 0.0;
    for skill in &schema.skills {
        let job_has = pair.job.skills.iter().any(|s| s == skill);
        let resume_has = pair.resume.skills.iter().any(|s| s == skill);
        row.insert(format!("job_has_{skill}"), job_has as u8 as f64);
        row.insert(format!("resume_has_{skill}"), resume_has as u8 as f64);
        job_skill_count += job_has as u8 as f64;
        resume_skill_count += resume_has as u8 as f64;
        if job_has && resume_has {
            skill_match_count += 1.0;
        }
    }

    // Experience numerics. Total experience is always the sum over every
    // known span for this résumé.
    let required_years = parse_required_years(&pair.job.required_experience);
    let actual_experience: f64 = pair
        .resume
        .spans
        .iter()
        .map(|s| resolve_span(s.start.as_deref(), s.end.as_deref()))
        .sum();
    let mut experience_match =
        1.0 - (required_years - actual_experience).abs() / required_years.max(1.0);
    if !experience_match.is_finite() {
        experience_match = 0.0;
    }
    let experience_match = experience_match.max(0.0);

    let location_match = location_match(&pair.job.location, &pair.resume.location);

    let job_text = job_text(pair);
    let resume_text = pair.resume.summary.as_str();
    let role_similarity = schema.role_scorer.similarity(&job_text, resume_text);
    let education_similarity = schema
        .edu_scorer
        .similarity(&pair.job.role, &pair.resume.education);

    row.insert("required_years".to_string(), required_years);
    row.insert("actual_experience".to_string(), actual_experience);
    row.insert("experience_match".to_string(), experience_match);
    row.insert("location_match".to_string(), location_match);
    row.insert("role_similarity".to_string(), role_similarity);
    row.insert("education_similarity".to_string(), education_similarity);

    // Derived interaction / nonlinear features.
    let resume_text_lower = resume_text.to_lowercase();
    let keyword_match_count = schema
        .keywords
        .iter()
        .filter(|k| resume_text_lower.contains(k.as_str()))
        .count() as f64;

    row.insert(
        "skill_experience_interaction".to_string(),
        experience_match * role_similarity,
    );
    row.insert(
        "experience_match_squared".to_string(),
        experience_match * experience_match,
    );
    row.insert(
        "role_similarity_squared".to_string(),
        role_similarity * role_similarity,
    );
    row.insert(
        "skill_match_ratio".to_string(),
        skill_match_count / job_skill_count.max(1.0),
    );
    row.insert(
        "skill_coverage_ratio".to_string(),
        skill_match_count / resume_skill_count.max(1.0),
    );
    row.insert("keyword_match_count".to_string(), keyword_match_count);
    row.insert(
        "composite_feature".to_string(),
        0.4 * role_similarity
            + 0.3 * experience_match
            + 0.2 * education_similarity
            + 0.1 * location_match,
    );

    row
}

/// Projects named row maps onto an exact column list. A named column a row
/// lacks is synthesized as 0 with a warning so column-set parity survives
/// partial input; it is never an error.
fn project_rows(maps: &[HashMap<String, f64>], cols: &[String]) -> Vec<Vec<f64>> {
    let mut missing_logged: BTreeSet<&str> = BTreeSet::new();
    maps.iter()
        .map(|map| {
            cols.iter()
                .map(|col| match map.get(col) {
                    Some(value) => *value,
                    None => {
                        if missing_logged.insert(col.as_str()) {
                            warn!("feature column '{col}' absent from input, synthesizing 0");
                        }
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

/// Lower bound of a requirement descriptor: "3-5" → 3, "5+ years" → 5,
/// "2 years" → 2, unparsable → 0.
pub fn parse_required_years(descriptor: &str) -> f64 {
    descriptor
        .trim()
        .split(['-', '+'])
        .next()
        .and_then(|head| head.split_whitespace().next())
        .and_then(|token| token.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Binary location match: 1 if the job is remote, or any comma-separated
/// token of the job location appears case-insensitively inside the résumé
/// location. Missing either side scores 0.
fn location_match(job_location: &str, resume_location: &str) -> f64 {
    let job_location = job_location.trim();
    if job_location.is_empty() {
        return 0.0;
    }
    if job_location.eq_ignore_ascii_case("remote") {
        return 1.0;
    }
    let resume_lower = resume_location.trim().to_lowercase();
    if resume_lower.is_empty() {
        return 0.0;
    }
    let matched = job_location
        .split(',')
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !token.is_empty())
        .any(|token| resume_lower.contains(&token));
    matched as u8 as f64
}
