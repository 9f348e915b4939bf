//! Domain records and the wire contract shared with the calling service.
//!
//! The inference request arrives as loosely-shaped JSON from an upstream
//! document store, so the nested résumé body is kept as `serde_json::Value`
//! and flattened defensively in the driver. The domain records below are
//! what the feature builder actually consumes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One job posting.
#[derive(Debug, Clone, Default)]
pub struct JobRecord {
    pub role: String,
    pub description: String,
    pub skills: Vec<String>,
    /// Free-form requirement descriptor, e.g. "3-5", "5+ years", "2".
    pub required_experience: String,
    /// Free text, or the sentinel "remote".
    pub location: String,
}

/// Raw start/end tokens of one employment span. Parsing is deferred to the
/// date resolver so that bad tokens degrade per-record instead of failing
/// deserialization.
#[derive(Debug, Clone, Default)]
pub struct ExperienceSpan {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// One candidate résumé. `spans` always carries every known employment
/// span; total experience is the sum over all of them, in both training
/// and replay.
#[derive(Debug, Clone, Default)]
pub struct ResumeRecord {
    pub id: String,
    pub summary: String,
    pub skills: Vec<String>,
    pub spans: Vec<ExperienceSpan>,
    pub education: String,
    /// Derived "city, country" descriptor.
    pub location: String,
}

/// The unit of scoring: one job × one résumé. Every pair yields exactly
/// one feature vector and one prediction row.
#[derive(Debug, Clone)]
pub struct Pair {
    pub job: JobRecord,
    pub resume: ResumeRecord,
}

// ────────────────────────────────────────────────────────────────────────────
// Inference wire contract
// ────────────────────────────────────────────────────────────────────────────

/// Target score dimension names, in canonical order. Ensemble models,
/// training targets, and prediction rows all key off this list.
pub const TARGETS: [&str; 6] = [
    "skillsScore",
    "experienceScore",
    "locationScore",
    "roleSimilarity",
    "educationScore",
    "matchScore",
];

/// Top level of the subprocess request file. Presence of `job_data` and
/// `resumes` is validated by the driver so a missing key yields a typed
/// input error instead of a serde parse failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub job_id: Option<String>,
    pub job_data: Option<JobData>,
    pub resumes: Option<Vec<ResumeEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobData {
    pub job_role: String,
    pub job_description: String,
    pub job_skills: Vec<String>,
    pub required_experience: String,
    pub job_location: String,
}

/// One résumé entry. The nested body stays untyped; the driver flattens it
/// field by field, degrading malformed shapes to empty defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ResumeEntry {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub resume: Value,
}

/// One scored candidate in the response.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRow {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "skillsScore")]
    pub skills_score: f64,
    #[serde(rename = "experienceScore")]
    pub experience_score: f64,
    #[serde(rename = "locationScore")]
    pub location_score: f64,
    #[serde(rename = "roleSimilarity")]
    pub role_similarity: f64,
    #[serde(rename = "educationScore")]
    pub education_score: f64,
    #[serde(rename = "matchScore")]
    pub match_score: f64,
    pub match_category: u8,
    /// Always equals `match_category`; the clustering side channel is never
    /// the surfaced label.
    pub cluster: u8,
}

/// Success response, printed to stdout as a single JSON line.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResponse {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "matchResults")]
    pub match_results: Vec<PredictionRow>,
    #[serde(rename = "birch_algorithm_executed")]
    pub clustering_executed: bool,
}

impl From<&JobData> for JobRecord {
    fn from(data: &JobData) -> Self {
        JobRecord {
            role: data.job_role.clone(),
            description: data.job_description.clone(),
            skills: data.job_skills.clone(),
            required_experience: data.required_experience.clone(),
            location: data.job_location.clone(),
        }
    }
}
