//! Integration tests against a running Redis instance.
//!
//! Run with: cargo test --test integration_test -- --ignored
//! Set REDIS_URL to override the default (redis://127.0.0.1:6379/0).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use certgen::models::artifact::{Artifact, ArtifactFormat};
use certgen::models::job::{JobState, StatusRecord};
use certgen::models::request::CertificateRequest;
use certgen::services::idgen;
use certgen::services::queue::{JobQueue, MaintenanceTask, WaitError};

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string())
}

fn queue() -> Arc<JobQueue> {
    Arc::new(JobQueue::new(&redis_url(), 60).expect("Failed to initialize queue"))
}

fn sample_request() -> CertificateRequest {
    CertificateRequest {
        user_name: "Test User".to_string(),
        college: "Test U".to_string(),
        certificate_id: idgen::generate_with_prefix("ITEST"),
        issued_at: "2026-08-07T10:00:00".to_string(),
        topic: "Testing".to_string(),
        user_id: Some(7),
        test_id: Some(2026),
    }
}

#[tokio::test]
#[ignore] // Requires a running Redis instance
async fn submit_dequeue_and_wait_round_trip() {
    let queue = queue();
    queue.health_check().await.expect("Redis not reachable");

    let request = sample_request();
    let certificate_id = request.certificate_id.clone();
    let handle = queue.submit(request).await.expect("Failed to submit");

    // The initial status record is visible immediately.
    let record = handle
        .status()
        .await
        .expect("Failed to read status")
        .expect("No status record");
    assert_eq!(record.state, JobState::Pending);
    assert_eq!(record.certificate_id, certificate_id);

    // A worker slot picks the job up.
    let job = queue
        .dequeue_generation()
        .await
        .expect("Failed to dequeue")
        .expect("No job in queue");
    assert_eq!(job.job_id, handle.job_id());
    assert_eq!(job.request.certificate_id, certificate_id);
    assert_eq!(job.request.user_id, Some(7));

    // Simulate the worker publishing a terminal status.
    let mut record = StatusRecord::new(job.job_id, &certificate_id, JobState::Validating);
    record.complete(&Artifact {
        path: PathBuf::from(format!("certificates/{certificate_id}.pdf")),
        size_bytes: 123_456,
        format: ArtifactFormat::Pdf,
    });
    queue
        .write_status(&record)
        .await
        .expect("Failed to write status");

    let path = handle
        .wait(Duration::from_secs(2))
        .await
        .expect("wait returned an error");
    assert_eq!(path, PathBuf::from(format!("certificates/{certificate_id}.pdf")));

    queue
        .complete_generation(&job)
        .await
        .expect("Failed to complete job");
}

#[tokio::test]
#[ignore] // Requires a running Redis instance
async fn wait_times_out_when_no_worker_is_running() {
    let queue = queue();
    let handle = queue
        .submit(sample_request())
        .await
        .expect("Failed to submit");

    let err = handle
        .wait(Duration::from_millis(600))
        .await
        .expect_err("expected a timeout");
    assert!(matches!(err, WaitError::Timeout));

    // Drain the job we left behind.
    let job = queue
        .dequeue_generation()
        .await
        .expect("Failed to dequeue")
        .expect("No job in queue");
    queue.complete_generation(&job).await.ok();
}

#[tokio::test]
#[ignore] // Requires a running Redis instance
async fn maintenance_and_monitoring_lanes_round_trip() {
    let queue = queue();

    let purge = MaintenanceTask::PurgeArtifacts { max_age_days: 30 };
    queue
        .enqueue_maintenance(&purge)
        .await
        .expect("Failed to enqueue purge");
    queue
        .enqueue_maintenance(&MaintenanceTask::HealthCheck)
        .await
        .expect("Failed to enqueue health check");

    // The maintenance lane drains before the monitoring lane.
    let first = queue
        .dequeue_maintenance()
        .await
        .expect("Failed to dequeue")
        .expect("No maintenance task");
    assert_eq!(first, purge);

    let second = queue
        .dequeue_maintenance()
        .await
        .expect("Failed to dequeue")
        .expect("No monitoring task");
    assert_eq!(second, MaintenanceTask::HealthCheck);

    assert!(queue
        .dequeue_maintenance()
        .await
        .expect("Failed to dequeue")
        .is_none());
}

#[tokio::test]
#[ignore] // Requires a running Redis instance
async fn unknown_job_ids_have_no_status() {
    let queue = queue();
    let record = queue
        .read_status(Uuid::new_v4())
        .await
        .expect("Failed to read status");
    assert!(record.is_none());
}
