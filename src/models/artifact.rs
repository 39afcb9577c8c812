use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Soft limit on artifact size; breaching it is logged, never fatal.
pub const ARTIFACT_SOFT_LIMIT_BYTES: u64 = 3 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactFormat {
    Pdf,
}

/// Final output of one generation job, persisted in the certificates store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub format: ArtifactFormat,
}

impl Artifact {
    pub fn exceeds_soft_limit(&self) -> bool {
        self.size_bytes > ARTIFACT_SOFT_LIMIT_BYTES
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_limit_boundary() {
        let mut artifact = Artifact {
            path: PathBuf::from("certificates/CERT-12345.pdf"),
            size_bytes: ARTIFACT_SOFT_LIMIT_BYTES,
            format: ArtifactFormat::Pdf,
        };
        assert!(!artifact.exceeds_soft_limit());

        artifact.size_bytes += 1;
        assert!(artifact.exceeds_soft_limit());
    }
}
