use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::config::AppConfig;

/// Point-in-time snapshot of pipeline dependencies. Recomputed on every
/// probe, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub timestamp: DateTime<Utc>,
    pub template_exists: bool,
    pub font_exists: bool,
    pub directories_writable: bool,
    pub renderer_available: bool,
    pub converter_available: bool,
}

impl HealthStatus {
    pub fn healthy(&self) -> bool {
        self.template_exists
            && self.font_exists
            && self.directories_writable
            && self.renderer_available
            && self.converter_available
    }
}

/// Probe pipeline dependencies. Never fails: every degraded check is
/// reported as a boolean field.
///
/// Read-only except for the scoped create-then-delete write test used to
/// verify the storage directories are writable.
pub async fn probe(config: &AppConfig) -> HealthStatus {
    let directories_writable =
        dir_writable(&config.certificates_dir) && dir_writable(&config.temp_dir);

    let renderer_available = binary_responds(&config.renderer_bin).await;
    let mut converter_available = false;
    for bin in &config.converter_bins {
        if binary_responds(bin).await {
            converter_available = true;
            break;
        }
    }

    HealthStatus {
        timestamp: Utc::now(),
        template_exists: config.template_path.exists(),
        font_exists: config.font_path.exists(),
        directories_writable,
        renderer_available,
        converter_available,
    }
}

fn dir_writable(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }
    // NamedTempFile deletes the probe file when dropped.
    tempfile::Builder::new()
        .prefix(".health_probe")
        .tempfile_in(dir)
        .is_ok()
}

async fn binary_responds(bin: &str) -> bool {
    Command::new(bin)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}
