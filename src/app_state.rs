use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::queue::JobQueue;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub queue: Arc<JobQueue>,
}

impl AppState {
    pub fn new(config: AppConfig, queue: JobQueue) -> Self {
        Self {
            config: Arc::new(config),
            queue: Arc::new(queue),
        }
    }
}
