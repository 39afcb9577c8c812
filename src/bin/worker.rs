//! Certificate generation worker: a pool of generation loops pulling one
//! job at a time from the generation lane, a maintenance loop for the
//! maintenance/monitoring lanes, and periodic schedulers feeding them.

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::sleep;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use certgen::config::AppConfig;
use certgen::models::job::{GenerationJob, JobState, StatusRecord};
use certgen::services::orchestrator::Orchestrator;
use certgen::services::queue::{JobQueue, MaintenanceTask, QueuedJob};
use certgen::services::{health, retention};

const POLL_INTERVAL_MS: u64 = 1000;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    info!("Starting certificate generation worker");

    // Load configuration
    let config = Arc::new(AppConfig::from_env().expect("Failed to load configuration"));

    // Initialize services
    let queue = Arc::new(
        JobQueue::new(&config.redis_url, config.status_ttl_secs)
            .expect("Failed to initialize job queue"),
    );
    let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&config)));

    info!(
        concurrency = config.worker_concurrency,
        "Worker ready, starting job processing loops"
    );

    let mut handles = Vec::new();
    for worker_id in 0..config.worker_concurrency {
        handles.push(tokio::spawn(generation_worker(
            worker_id,
            Arc::clone(&queue),
            Arc::clone(&orchestrator),
        )));
    }
    handles.push(tokio::spawn(maintenance_worker(
        Arc::clone(&queue),
        Arc::clone(&config),
    )));
    handles.push(tokio::spawn(maintenance_scheduler(
        Arc::clone(&queue),
        Arc::clone(&config),
    )));

    signal::ctrl_c()
        .await
        .expect("Failed to listen for Ctrl+C");
    info!("Received shutdown signal, stopping workers");

    for handle in &handles {
        handle.abort();
    }
}

/// One generation worker slot: holds at most one job at a time.
async fn generation_worker(worker_id: usize, queue: Arc<JobQueue>, orchestrator: Arc<Orchestrator>) {
    info!(worker_id, "generation worker started");
    loop {
        let job = match queue.dequeue_generation().await {
            Ok(Some(job)) => job,
            Ok(None) => {
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
                continue;
            }
            Err(e) => {
                error!(worker_id, error = %e, "failed to dequeue job, will retry");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
                continue;
            }
        };

        if let Ok(depth) = queue.queue_depth().await {
            metrics::gauge!("certificate_queue_depth").set(depth as f64);
        }

        process_job(&queue, &orchestrator, job).await;
    }
}

/// Drive one dequeued job through the pipeline and publish its outcome.
async fn process_job(queue: &JobQueue, orchestrator: &Orchestrator, queued: QueuedJob) {
    info!(
        job_id = %queued.job_id,
        certificate_id = %queued.request.certificate_id,
        "processing generation job"
    );

    let mut record = StatusRecord::new(
        queued.job_id,
        &queued.request.certificate_id,
        JobState::Validating,
    );
    if let Err(e) = queue.write_status(&record).await {
        error!(job_id = %queued.job_id, error = %e, "failed to write job status");
    }

    let started = std::time::Instant::now();
    let mut job = GenerationJob::new(queued.job_id, queued.request.clone());
    let result = orchestrator.run(&mut job).await;
    metrics::histogram!("certificate_generation_seconds").record(started.elapsed().as_secs_f64());

    record.retry_count = job.retry_count;
    match result {
        Ok(artifact) => {
            record.complete(&artifact);
            metrics::counter!("certificate_jobs_completed").increment(1);
            info!(
                job_id = %queued.job_id,
                path = %artifact.path.display(),
                duration_ms = started.elapsed().as_millis() as u64,
                "job completed"
            );
        }
        Err(e) => {
            record.fail(e.to_string());
            metrics::counter!("certificate_jobs_failed").increment(1);
            error!(job_id = %queued.job_id, error = %e, "job failed");
        }
    }

    if let Err(e) = queue.write_status(&record).await {
        error!(job_id = %queued.job_id, error = %e, "failed to write terminal job status");
    }
    if let Err(e) = queue.complete_generation(&queued).await {
        error!(job_id = %queued.job_id, error = %e, "failed to drop job from processing list");
    }
}

/// Consume the maintenance and monitoring lanes.
async fn maintenance_worker(queue: Arc<JobQueue>, config: Arc<AppConfig>) {
    info!("maintenance worker started");
    loop {
        match queue.dequeue_maintenance().await {
            Ok(Some(task)) => run_maintenance_task(task, &config).await,
            Ok(None) => sleep(Duration::from_millis(POLL_INTERVAL_MS * 5)).await,
            Err(e) => {
                error!(error = %e, "failed to dequeue maintenance task");
                sleep(Duration::from_millis(POLL_INTERVAL_MS * 5)).await;
            }
        }
    }
}

async fn run_maintenance_task(task: MaintenanceTask, config: &AppConfig) {
    match task {
        MaintenanceTask::PurgeArtifacts { max_age_days } => {
            let certificates_dir = config.certificates_dir.clone();
            let temp_dir = config.temp_dir.clone();
            let temp_retention_hours = config.temp_retention_hours;
            let result = tokio::task::spawn_blocking(move || {
                retention::purge(
                    &certificates_dir,
                    &temp_dir,
                    max_age_days,
                    temp_retention_hours,
                )
            })
            .await;
            match result {
                Ok(stats) => info!(
                    files_removed = stats.files_removed,
                    bytes_freed = stats.bytes_freed,
                    "retention sweep finished"
                ),
                Err(e) => error!(error = %e, "retention sweep task panicked"),
            }
        }
        MaintenanceTask::HealthCheck => {
            let status = health::probe(config).await;
            if status.healthy() {
                info!(status = ?status, "health probe ok");
            } else {
                warn!(status = ?status, "health probe found degraded dependencies");
            }
        }
    }
}

/// Enqueue the daily retention sweep and the hourly health probe into their
/// lanes. Both intervals fire once immediately at startup.
async fn maintenance_scheduler(queue: Arc<JobQueue>, config: Arc<AppConfig>) {
    let mut purge_tick = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
    let mut health_tick = tokio::time::interval(Duration::from_secs(60 * 60));

    loop {
        tokio::select! {
            _ = purge_tick.tick() => {
                let task = MaintenanceTask::PurgeArtifacts {
                    max_age_days: config.retention_days,
                };
                if let Err(e) = queue.enqueue_maintenance(&task).await {
                    error!(error = %e, "failed to enqueue retention sweep");
                }
            }
            _ = health_tick.tick() => {
                if let Err(e) = queue.enqueue_maintenance(&MaintenanceTask::HealthCheck).await {
                    error!(error = %e, "failed to enqueue health probe");
                }
            }
        }
    }
}
