use thiserror::Error;

/// Pipeline-level error type.
///
/// Anything that would silently corrupt a whole response (schema mismatch,
/// missing request fields, unreadable model bundle) surfaces here and is
/// fatal. Record-level data problems never become a `PipelineError`; they
/// degrade in place to a safe default and log a warning, so one bad résumé
/// cannot sink an entire batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Schema mismatch: {0}")]
    Schema(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Diagnostic-only failures (clustering). Callers catch these, flip a
    /// success flag, and keep going.
    #[error("Diagnostic error: {0}")]
    Diagnostic(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
