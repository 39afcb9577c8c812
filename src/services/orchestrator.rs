//! The task-queue-facing pipeline core: validate, render, convert, with
//! bounded retry and guaranteed temp-file cleanup.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::models::artifact::Artifact;
use crate::models::job::{GenerationJob, JobState};
use crate::services::converter::{ConvertError, PdfConverter};
use crate::services::renderer::{CertificateRenderer, RenderError};
use crate::services::validation::{self, ValidationError};

pub struct Orchestrator {
    config: Arc<AppConfig>,
    renderer: CertificateRenderer,
    converter: PdfConverter,
}

impl Orchestrator {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let renderer = CertificateRenderer::from_config(&config);
        let converter = PdfConverter::from_config(&config);
        Self {
            config,
            renderer,
            converter,
        }
    }

    /// Drive one job to a terminal state.
    ///
    /// The retry loop lives here, not in the stages: a transient fault
    /// re-enters the pipeline from validation after a fixed backoff, up to
    /// `max_retries`. Permanent faults (bad input, missing assets) fail
    /// immediately. Temp files are released after every attempt and on
    /// both terminal states.
    pub async fn run(&self, job: &mut GenerationJob) -> Result<Artifact, GenerationError> {
        let hard_limit = Duration::from_secs(self.config.job_time_limit_secs);
        let soft_limit = Duration::from_secs(self.config.job_soft_time_limit_secs);

        loop {
            let started = Instant::now();
            let outcome = match tokio::time::timeout(hard_limit, self.attempt(job)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(GenerationError::Timeout {
                    limit_secs: self.config.job_time_limit_secs,
                }),
            };
            job.temps.cleanup();

            match outcome {
                Ok(artifact) => {
                    job.state = JobState::Done;
                    if started.elapsed() > soft_limit {
                        warn!(
                            certificate_id = %job.request.certificate_id,
                            elapsed_secs = started.elapsed().as_secs(),
                            soft_limit_secs = self.config.job_soft_time_limit_secs,
                            "job exceeded the soft time limit"
                        );
                    }
                    if artifact.exceeds_soft_limit() {
                        warn!(
                            certificate_id = %job.request.certificate_id,
                            size_mb = artifact.size_mb(),
                            "artifact exceeds the soft size limit"
                        );
                    }
                    info!(
                        certificate_id = %job.request.certificate_id,
                        path = %artifact.path.display(),
                        size_bytes = artifact.size_bytes,
                        retries = job.retry_count,
                        "certificate generated"
                    );
                    return Ok(artifact);
                }
                Err(err) if err.is_transient() && job.retry_count < self.config.max_retries => {
                    job.state = JobState::Retrying;
                    job.retry_count += 1;
                    warn!(
                        certificate_id = %job.request.certificate_id,
                        attempt = job.retry_count,
                        max_retries = self.config.max_retries,
                        error = %err,
                        "transient failure, retrying after backoff"
                    );
                    tokio::time::sleep(Duration::from_secs(self.config.retry_backoff_secs)).await;
                }
                Err(err) => {
                    job.state = JobState::Failed;
                    let err = if err.is_transient() {
                        GenerationError::RetriesExhausted {
                            attempts: job.retry_count + 1,
                            source: Box::new(err),
                        }
                    } else {
                        err
                    };
                    error!(
                        certificate_id = %job.request.certificate_id,
                        error = %err,
                        "certificate generation failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(&self, job: &mut GenerationJob) -> Result<Artifact, GenerationError> {
        job.state = JobState::Validating;
        let validated = validation::validate(&job.request)?;

        job.state = JobState::Rendering;
        let raster = self.renderer.render(&validated, &mut job.temps).await?;

        job.state = JobState::Converting;
        let output = self
            .config
            .certificates_dir
            .join(format!("{}.pdf", job.request.certificate_id));
        let artifact = self.converter.convert(&raster, &output).await?;
        Ok(artifact)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("rendering failed: {0}")]
    Rendering(#[from] RenderError),

    #[error("conversion failed: {0}")]
    Conversion(#[from] ConvertError),

    #[error("job exceeded the {limit_secs}s wall-clock limit")]
    Timeout { limit_secs: u64 },

    /// Terminal wrapper: the last transient cause plus how many attempts
    /// were made.
    #[error("failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<GenerationError>,
    },
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Validation(_) => false,
            GenerationError::Rendering(e) => e.is_transient(),
            GenerationError::Conversion(_) => true,
            GenerationError::Timeout { .. } => true,
            GenerationError::RetriesExhausted { .. } => false,
        }
    }
}
