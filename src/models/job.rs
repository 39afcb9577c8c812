use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::models::artifact::Artifact;
use crate::models::request::CertificateRequest;

/// State of a generation job in the pipeline.
///
/// `Retrying` is entered from any transient failure in the rendering or
/// conversion stages; `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    Pending,
    Validating,
    Rendering,
    Converting,
    Retrying,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

/// In-worker wrapper around one dequeued request.
///
/// Owns the job's temporary files; they are released after every attempt
/// and on both terminal states.
#[derive(Debug)]
pub struct GenerationJob {
    pub job_id: Uuid,
    pub request: CertificateRequest,
    pub state: JobState,
    pub retry_count: u32,
    pub temps: TempFiles,
}

impl GenerationJob {
    pub fn new(job_id: Uuid, request: CertificateRequest) -> Self {
        Self {
            job_id,
            request,
            state: JobState::Pending,
            retry_count: 0,
            temps: TempFiles::default(),
        }
    }
}

/// Temporary files owned by a single job.
///
/// `cleanup` is the single finalization step; `Drop` is only a backstop so
/// an early return or panic cannot leak scratch files.
#[derive(Debug, Default)]
pub struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    pub fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "removed temp file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove temp file")
                }
            }
        }
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Job status snapshot stored in Redis for client polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    pub job_id: Uuid,
    pub certificate_id: String,
    pub state: JobState,
    pub artifact_path: Option<String>,
    pub error: Option<String>,
    pub retry_count: u32,
    pub updated_at: DateTime<Utc>,
}

impl StatusRecord {
    pub fn new(job_id: Uuid, certificate_id: &str, state: JobState) -> Self {
        Self {
            job_id,
            certificate_id: certificate_id.to_string(),
            state,
            artifact_path: None,
            error: None,
            retry_count: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn complete(&mut self, artifact: &Artifact) {
        self.state = JobState::Done;
        self.artifact_path = Some(artifact.path.display().to_string());
        self.error = None;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, error: String) {
        self.state = JobState::Failed;
        self.error = Some(error);
        self.updated_at = Utc::now();
    }
}
