use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::api::{ErrorResponse, SubmitResponse};
use crate::models::job::{JobState, StatusRecord};
use crate::models::request::CertificateRequest;
use crate::services::{idgen, validation};

/// POST /api/v1/certificates — submit a certificate for generation.
///
/// A missing certificate id is filled in server-side. Validation runs
/// eagerly so malformed input is rejected with the full field list before
/// paying for a queue round-trip; the worker re-validates on dequeue.
pub async fn submit_certificate(
    State(state): State<AppState>,
    Json(mut request): Json<CertificateRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, Json<ErrorResponse>)> {
    if request.certificate_id.is_empty() {
        request.certificate_id = idgen::generate();
    }

    if let Err(e) = validation::validate(&request) {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: e.to_string(),
                fields: e.fields,
            }),
        ));
    }

    metrics::counter!("certificate_jobs_total").increment(1);

    let certificate_id = request.certificate_id.clone();
    let handle = state.queue.submit(request).await.map_err(|e| {
        tracing::error!(error = %e, "failed to enqueue generation job");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("failed to enqueue job")),
        )
    })?;

    tracing::info!(
        job_id = %handle.job_id(),
        certificate_id = %certificate_id,
        "generation job queued"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id: handle.job_id(),
            certificate_id,
            status: JobState::Pending,
            message: "certificate queued for generation".to_string(),
        }),
    ))
}

/// GET /api/v1/certificates/{job_id} — query generation job status.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<StatusRecord>, (StatusCode, Json<ErrorResponse>)> {
    match state.queue.read_status(job_id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("unknown or expired job id")),
        )),
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "failed to read job status");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("failed to read job status")),
            ))
        }
    }
}
