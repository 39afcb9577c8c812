use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::models::job::{JobState, StatusRecord};
use crate::models::request::CertificateRequest;

/// Generation, maintenance and monitoring traffic run on separate lanes so
/// neither class can starve the other.
const GENERATION_QUEUE_KEY: &str = "certgen:jobs:generation";
const GENERATION_PROCESSING_KEY: &str = "certgen:jobs:generation:processing";
const MAINTENANCE_QUEUE_KEY: &str = "certgen:jobs:maintenance";
const MONITORING_QUEUE_KEY: &str = "certgen:jobs:monitoring";
const STATUS_KEY_PREFIX: &str = "certgen:status";

const WAIT_POLL_INTERVAL_MS: u64 = 250;

/// Generation job payload serialized into Redis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job_id: Uuid,
    pub request: CertificateRequest,
}

/// Periodic task payload for the maintenance/monitoring lanes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum MaintenanceTask {
    PurgeArtifacts { max_age_days: u64 },
    HealthCheck,
}

/// Redis-backed job queue with per-job status records.
///
/// Cloning is cheap: the client only carries connection info, and every
/// operation opens its own multiplexed connection.
#[derive(Clone)]
pub struct JobQueue {
    client: redis::Client,
    status_ttl_secs: u64,
}

impl JobQueue {
    pub fn new(redis_url: &str, status_ttl_secs: u64) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self {
            client,
            status_ttl_secs,
        })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, QueueError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)
    }

    /// Submit a generation request: write the initial status record and
    /// enqueue the job, returning a handle the producer can wait on.
    pub async fn submit(&self, request: CertificateRequest) -> Result<JobHandle, QueueError> {
        let job = QueuedJob {
            job_id: Uuid::new_v4(),
            request,
        };
        let record = StatusRecord::new(job.job_id, &job.request.certificate_id, JobState::Pending);
        self.write_status(&record).await?;

        let payload = serde_json::to_string(&job).map_err(QueueError::Serialize)?;
        let mut conn = self.conn().await?;
        conn.lpush::<_, _, ()>(GENERATION_QUEUE_KEY, &payload)
            .await
            .map_err(QueueError::Redis)?;

        Ok(JobHandle {
            job_id: job.job_id,
            queue: self.clone(),
        })
    }

    /// Pop one generation job, moving it to the processing list. Each
    /// worker slot holds at most one job at a time.
    pub async fn dequeue_generation(&self) -> Result<Option<QueuedJob>, QueueError> {
        let mut conn = self.conn().await?;
        let payload: Option<String> = conn
            .rpoplpush(GENERATION_QUEUE_KEY, GENERATION_PROCESSING_KEY)
            .await
            .map_err(QueueError::Redis)?;

        match payload {
            Some(payload) => {
                let job: QueuedJob =
                    serde_json::from_str(&payload).map_err(QueueError::Serialize)?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Drop a finished job from the processing list.
    pub async fn complete_generation(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job).map_err(QueueError::Serialize)?;
        let mut conn = self.conn().await?;
        conn.lrem::<_, _, ()>(GENERATION_PROCESSING_KEY, 1, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Route a maintenance task to its lane.
    pub async fn enqueue_maintenance(&self, task: &MaintenanceTask) -> Result<(), QueueError> {
        let key = match task {
            MaintenanceTask::HealthCheck => MONITORING_QUEUE_KEY,
            _ => MAINTENANCE_QUEUE_KEY,
        };
        let payload = serde_json::to_string(task).map_err(QueueError::Serialize)?;
        let mut conn = self.conn().await?;
        conn.lpush::<_, _, ()>(key, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Pop the next maintenance or monitoring task, if any.
    pub async fn dequeue_maintenance(&self) -> Result<Option<MaintenanceTask>, QueueError> {
        let mut conn = self.conn().await?;
        for key in [MAINTENANCE_QUEUE_KEY, MONITORING_QUEUE_KEY] {
            let payload: Option<String> =
                conn.rpop(key, None).await.map_err(QueueError::Redis)?;
            if let Some(payload) = payload {
                let task: MaintenanceTask =
                    serde_json::from_str(&payload).map_err(QueueError::Serialize)?;
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    /// Write a job status record with the configured TTL.
    pub async fn write_status(&self, record: &StatusRecord) -> Result<(), QueueError> {
        let key = format!("{STATUS_KEY_PREFIX}:{}", record.job_id);
        let payload = serde_json::to_string(record).map_err(QueueError::Serialize)?;
        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(&key, &payload, self.status_ttl_secs)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Read a job status record, `None` if unknown or expired.
    pub async fn read_status(&self, job_id: Uuid) -> Result<Option<StatusRecord>, QueueError> {
        let key = format!("{STATUS_KEY_PREFIX}:{job_id}");
        let mut conn = self.conn().await?;
        let payload: Option<String> = conn.get(&key).await.map_err(QueueError::Redis)?;
        match payload {
            Some(payload) => {
                let record: StatusRecord =
                    serde_json::from_str(&payload).map_err(QueueError::Serialize)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Current generation lane depth (pending jobs).
    pub async fn queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn().await?;
        let depth: u64 = conn
            .llen(GENERATION_QUEUE_KEY)
            .await
            .map_err(QueueError::Redis)?;
        Ok(depth)
    }
}

/// Producer-side handle for one submitted job.
pub struct JobHandle {
    job_id: Uuid,
    queue: JobQueue,
}

impl JobHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Non-blocking status query.
    pub async fn status(&self) -> Result<Option<StatusRecord>, QueueError> {
        self.queue.read_status(self.job_id).await
    }

    /// Block until the job reaches a terminal state, returning the artifact
    /// path on success.
    pub async fn wait(&self, timeout: Duration) -> Result<PathBuf, WaitError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(record) = self.queue.read_status(self.job_id).await? {
                match record.state {
                    JobState::Done => {
                        return record
                            .artifact_path
                            .map(PathBuf::from)
                            .ok_or_else(|| {
                                WaitError::Failed("status record missing artifact path".to_string())
                            });
                    }
                    JobState::Failed => {
                        return Err(WaitError::Failed(
                            record
                                .error
                                .unwrap_or_else(|| "unknown failure".to_string()),
                        ));
                    }
                    _ => {}
                }
            }
            if Instant::now() >= deadline {
                return Err(WaitError::Timeout);
            }
            tokio::time::sleep(Duration::from_millis(WAIT_POLL_INTERVAL_MS)).await;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("job failed: {0}")]
    Failed(String),

    #[error("timed out waiting for job result")]
    Timeout,

    #[error(transparent)]
    Queue(#[from] QueueError),
}
