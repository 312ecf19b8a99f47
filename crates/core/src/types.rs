//! Core type aliases and identifier validation.

use crate::error::CoreError;

/// Job identifiers are server-issued UUIDs, carried as strings.
pub type JobId = String;

/// Prediction identifiers are opaque strings, unique within a job.
pub type PredictionId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Validate that a job id is a well-formed UUID.
///
/// The channel endpoint rejects malformed ids with a policy-violation
/// close, so callers that have the id ahead of time should validate
/// before connecting.
pub fn validate_job_id(job_id: &str) -> Result<(), CoreError> {
    uuid::Uuid::parse_str(job_id)
        .map(|_| ())
        .map_err(|_| CoreError::Validation(format!("Invalid job id '{job_id}': expected a UUID")))
}
