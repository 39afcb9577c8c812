//! Raster to PDF conversion with ordered fallback across engines.

use std::ffi::OsString;
use std::path::Path;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::models::artifact::{Artifact, ArtifactFormat};

/// Degradation settings applied identically by every strategy, so output
/// quality does not depend on which engine happened to succeed.
const PDF_DENSITY: &str = "200";
const PDF_QUALITY: &str = "85";

pub struct PdfConverter {
    strategies: Vec<String>,
}

impl PdfConverter {
    pub fn new(strategies: Vec<String>) -> Self {
        Self { strategies }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.converter_bins.clone())
    }

    /// Convert the raster into a PDF at `output`.
    ///
    /// Strategies are tried in order; non-zero exit or a missing binary
    /// advances to the next one, and the first success wins. No quality
    /// comparison is made across strategies.
    pub async fn convert(&self, raster: &Path, output: &Path) -> Result<Artifact, ConvertError> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut attempts = Vec::new();
        for bin in &self.strategies {
            let args = strategy_args(bin, raster, output);
            match Command::new(bin).kill_on_drop(true).args(&args).output().await {
                Ok(out) if out.status.success() => {
                    let size_bytes = tokio::fs::metadata(output).await?.len();
                    info!(
                        engine = %bin,
                        output = %output.display(),
                        size_bytes,
                        "PDF conversion succeeded"
                    );
                    return Ok(Artifact {
                        path: output.to_path_buf(),
                        size_bytes,
                        format: ArtifactFormat::Pdf,
                    });
                }
                Ok(out) => {
                    let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
                    warn!(engine = %bin, exit = ?out.status.code(), "conversion strategy failed, trying next");
                    attempts.push(format!("{bin} (exit {:?}): {stderr}", out.status.code()));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(engine = %bin, "conversion engine not found, trying next");
                    attempts.push(format!("{bin}: executable not found"));
                }
                Err(e) => {
                    warn!(engine = %bin, error = %e, "conversion strategy errored, trying next");
                    attempts.push(format!("{bin}: {e}"));
                }
            }
        }

        Err(ConvertError::Exhausted {
            attempts: attempts.join("; "),
        })
    }
}

/// Argument shape per engine family. The alternate engine takes an
/// input-flag/muxer form; the primary and its legacy variant share the
/// classic positional form.
fn strategy_args(bin: &str, raster: &Path, output: &Path) -> Vec<OsString> {
    let stem = Path::new(bin)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(bin);
    if stem.contains("ffmpeg") {
        vec![
            OsString::from("-y"),
            OsString::from("-i"),
            raster.as_os_str().to_os_string(),
            OsString::from("-f"),
            OsString::from("pdf"),
            output.as_os_str().to_os_string(),
        ]
    } else {
        vec![
            raster.as_os_str().to_os_string(),
            OsString::from("-density"),
            OsString::from(PDF_DENSITY),
            OsString::from("-quality"),
            OsString::from(PDF_QUALITY),
            OsString::from("-compress"),
            OsString::from("jpeg"),
            output.as_os_str().to_os_string(),
        ]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Every fallback strategy failed; carries one summary per attempt.
    #[error("all conversion strategies failed: {attempts}")]
    Exhausted { attempts: String },

    #[error("I/O error during conversion: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magick_style_args_carry_fixed_degradation_settings() {
        let args = strategy_args("magick", Path::new("in.jpg"), Path::new("out.pdf"));
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            ["in.jpg", "-density", "200", "-quality", "85", "-compress", "jpeg", "out.pdf"]
        );
    }

    #[test]
    fn ffmpeg_args_use_the_muxer_form() {
        let args = strategy_args("/usr/bin/ffmpeg", Path::new("in.jpg"), Path::new("out.pdf"));
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, ["-y", "-i", "in.jpg", "-f", "pdf", "out.pdf"]);
    }

    #[tokio::test]
    async fn exhaustion_names_every_attempted_engine() {
        let dir = tempfile::tempdir().unwrap();
        let raster = dir.path().join("in.jpg");
        std::fs::write(&raster, b"raster").unwrap();

        let converter = PdfConverter::new(vec![
            "certgen-test-missing-engine-a".to_string(),
            "certgen-test-missing-engine-b".to_string(),
        ]);
        let err = converter
            .convert(&raster, &dir.path().join("out.pdf"))
            .await
            .unwrap_err();

        match err {
            ConvertError::Exhausted { attempts } => {
                assert!(attempts.contains("certgen-test-missing-engine-a"));
                assert!(attempts.contains("certgen-test-missing-engine-b"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn first_successful_strategy_wins() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let raster = dir.path().join("in.jpg");
        std::fs::write(&raster, b"raster").unwrap();

        // Stub engine: writes a PDF header to its last argument.
        let stub = dir.path().join("stub-convert");
        std::fs::write(
            &stub,
            "#!/bin/sh\nfor a in \"$@\"; do last=\"$a\"; done\nprintf '%%PDF-1.4 stub' > \"$last\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

        let converter = PdfConverter::new(vec![
            "certgen-test-missing-engine".to_string(),
            stub.display().to_string(),
        ]);
        let output = dir.path().join("out.pdf");
        let artifact = converter.convert(&raster, &output).await.unwrap();

        assert_eq!(artifact.path, output);
        assert_eq!(artifact.format, ArtifactFormat::Pdf);
        assert!(artifact.size_bytes > 0);
        assert!(output.exists());
    }
}
