use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Redis connection string for the job queue
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Certificate template image
    #[serde(default = "default_template_path")]
    pub template_path: PathBuf,

    /// Font used for text overlays
    #[serde(default = "default_font_path")]
    pub font_path: PathBuf,

    /// Directory for finished certificate PDFs
    #[serde(default = "default_certificates_dir")]
    pub certificates_dir: PathBuf,

    /// Scratch directory for per-job temporary files
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Number of concurrent generation worker loops
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Maximum retries per job after the initial attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between retry attempts, in seconds
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,

    /// Hard wall-clock limit for a single generation attempt, in seconds
    #[serde(default = "default_job_time_limit_secs")]
    pub job_time_limit_secs: u64,

    /// Soft limit below the hard one; breaching it only logs a warning
    #[serde(default = "default_job_soft_time_limit_secs")]
    pub job_soft_time_limit_secs: u64,

    /// Certificates older than this many days are purged by the retention sweep
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,

    /// Temp files older than this many hours are purged by the retention sweep
    #[serde(default = "default_temp_retention_hours")]
    pub temp_retention_hours: u64,

    /// TTL for job status records in Redis, in seconds
    #[serde(default = "default_status_ttl_secs")]
    pub status_ttl_secs: u64,

    /// Watermark line drawn on each certificate; empty or unset disables it
    #[serde(default = "default_watermark")]
    pub watermark: Option<String>,

    /// Rendering engine executable
    #[serde(default = "default_renderer_bin")]
    pub renderer_bin: String,

    /// PDF conversion executables, tried in order (comma-separated in the env)
    #[serde(default = "default_converter_bins")]
    pub converter_bins: Vec<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

fn default_template_path() -> PathBuf {
    PathBuf::from("templates/certificate_template.jpg")
}

fn default_font_path() -> PathBuf {
    PathBuf::from("fonts/OpenSans-Bold.ttf")
}

fn default_certificates_dir() -> PathBuf {
    PathBuf::from("certificates")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_worker_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_secs() -> u64 {
    60
}

fn default_job_time_limit_secs() -> u64 {
    300
}

fn default_job_soft_time_limit_secs() -> u64 {
    240
}

fn default_retention_days() -> u64 {
    30
}

fn default_temp_retention_hours() -> u64 {
    24
}

fn default_status_ttl_secs() -> u64 {
    3600
}

fn default_watermark() -> Option<String> {
    Some("Generated by certgen".to_string())
}

fn default_renderer_bin() -> String {
    "ffmpeg".to_string()
}

fn default_converter_bins() -> Vec<String> {
    vec![
        "magick".to_string(),
        "convert".to_string(),
        "ffmpeg".to_string(),
    ]
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
