use serde::Serialize;
use uuid::Uuid;

use crate::models::job::JobState;

/// Response after submitting a certificate for generation.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub certificate_id: String,
    pub status: JobState,
    pub message: String,
}

/// Error payload for rejected or failed API calls.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            fields: Vec::new(),
        }
    }
}
