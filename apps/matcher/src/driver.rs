//! Inference driver — orchestrates one subprocess invocation end to end:
//! load artifact, flatten the request into pairs, replay the frozen
//! feature build, predict, categorize, run the clustering side channel,
//! and assemble the response.
//!
//! The driver returns a typed outcome; the `score` binary owns stdout
//! printing and process exit codes.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::artifact;
use crate::categorize::categorize;
use crate::cluster::{self, ClusterConfig};
use crate::errors::PipelineError;
use crate::features::builder::FeatureBuilder;
use crate::model::records::{
    ExperienceSpan, JobRecord, MatchRequest, MatchResponse, Pair, PredictionRow, ResumeEntry,
    ResumeRecord,
};

/// Result of a driver run that completed without a fatal error.
#[derive(Debug)]
pub enum Outcome {
    Scored(MatchResponse),
    /// The request was well-formed but contained no usable résumés.
    NoValidResumes { job_id: String },
}

/// A fatal error plus whatever job id was recoverable from the request,
/// so the error payload can still name the job.
#[derive(Debug)]
pub struct DriverFailure {
    pub job_id: Option<String>,
    pub error: PipelineError,
}

pub fn run(request_path: &Path, model_path: &Path) -> Result<Outcome, DriverFailure> {
    let raw = fs::read_to_string(request_path).map_err(|e| DriverFailure {
        job_id: None,
        error: PipelineError::Input(format!(
            "input file '{}' unreadable: {e}",
            request_path.display()
        )),
    })?;

    // Parse untyped first so a decode failure further down can still name
    // the job in its error payload.
    let raw_value: Value = serde_json::from_str(&raw).map_err(|e| DriverFailure {
        job_id: None,
        error: PipelineError::Input(format!(
            "could not decode JSON from '{}': {e}",
            request_path.display()
        )),
    })?;
    let job_id = raw_value
        .get("jobId")
        .and_then(Value::as_str)
        .unwrap_or("unknown_job")
        .to_string();
    let fail = |error: PipelineError| DriverFailure {
        job_id: Some(job_id.clone()),
        error,
    };

    let request: MatchRequest = serde_json::from_value(raw_value)
        .map_err(|e| fail(PipelineError::Input(format!("malformed request: {e}"))))?;
    let job_data = request.job_data.ok_or_else(|| {
        fail(PipelineError::Input(
            "missing 'jobData' in input JSON".to_string(),
        ))
    })?;
    let resumes = request.resumes.ok_or_else(|| {
        fail(PipelineError::Input(
            "missing 'resumes' in input JSON".to_string(),
        ))
    })?;

    let bundle = artifact::load(model_path).map_err(&fail)?;

    let job = JobRecord::from(&job_data);
    let pairs: Vec<Pair> = resumes
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            flatten_resume(index, entry).map(|resume| Pair {
                job: job.clone(),
                resume,
            })
        })
        .collect();
    info!("job {job_id}: {} of {} resumes usable", pairs.len(), resumes.len());

    if pairs.is_empty() {
        warn!("job {job_id}: no valid resumes processed");
        return Ok(Outcome::NoValidResumes {
            job_id: job_id.clone(),
        });
    }

    let matrix = FeatureBuilder::replay(&pairs, &bundle.schema).map_err(&fail)?;
    let predictions = bundle.ensemble.predict(&matrix.rows).map_err(&fail)?;

    let match_results: Vec<PredictionRow> = pairs
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

    // Side channel only: the labels are discarded, the flag is observable.
    let clustering_executed = cluster::run_diagnostic(&matrix.rows, &ClusterConfig::default());

    Ok(Outcome::Scored(MatchResponse {
        job_id,
        match_results,
        clustering_executed,
    }))
}

/// Flattens one résumé entry into a `ResumeRecord`, degrading malformed
/// nested shapes to empty defaults. Returns `None` (and warns) only when
/// the nested résumé body is not an object at all.
pub fn flatten_resume(index: usize, entry: &ResumeEntry) -> Option<ResumeRecord> {
    let id = entry
        .id
        .clone()
        .unwrap_or_else(|| format!("unknown_id_{index}"));

    let body = match &entry.resume {
        Value::Object(map) => map,
        other => {
            warn!(
                "skipping resume index {index} (id: {id}): body is {}, not an object",
                value_kind(other)
            );
            return None;
        }
    };

    let skills = match body.get("skills") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.to_string())
            .collect(),
        Some(_) => {
            warn!("skills for resume {id} is not a list, treating as empty");
            Vec::new()
        }
        None => Vec::new(),
    };

    let experience = body.get("experience").and_then(Value::as_object);
    let span = ExperienceSpan {
        start: experience
            .and_then(|e| e.get("startDate"))
            .and_then(Value::as_str)
            .map(|s| s.to_string()),
        end: experience
            .and_then(|e| e.get("endDate"))
            .and_then(Value::as_str)
            .map(|s| s.to_string()),
    };

    let personal = body.get("personal").and_then(Value::as_object);
    let city = personal
        .and_then(|p| p.get("city"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let country = personal
        .and_then(|p| p.get("country"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let location = match (city.is_empty(), country.is_empty()) {
        (true, true) => String::new(),
        (false, true) => city.to_string(),
        (true, false) => country.to_string(),
        (false, false) => format!("{city}, {country}"),
    };

    Some(ResumeRecord {
        id,
        summary: string_field(body, "professionalSummary"),
        skills,
        spans: vec![span],
        education: body
            .get("education")
            .and_then(Value::as_object)
            .and_then(|e| e.get("description"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        location,
    })
}

fn string_field(map: &serde_json::Map<String, Value>, key: &str) -> String {
    map.get(key).and_then(Value::as_str).unwrap_or("").to_string()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
