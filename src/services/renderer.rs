//! Template + text + QR compositing via an external rendering engine.

use qrcode::{EcLevel, QrCode};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::models::job::TempFiles;
use crate::models::request::{parse_timestamp, CertificateRequest, ValidatedRequest};

/// QR module colors: dark blue-gray on white.
const QR_DARK: [u8; 3] = [0x2c, 0x3e, 0x50];
const QR_LIGHT: [u8; 3] = [0xff, 0xff, 0xff];

/// Rendered size of the QR overlay and its margin from the corner, in pixels.
const QR_SIZE: u32 = 220;
const QR_MARGIN: u32 = 90;

pub struct CertificateRenderer {
    template_path: PathBuf,
    font_path: PathBuf,
    temp_dir: PathBuf,
    renderer_bin: String,
    watermark: Option<String>,
}

impl CertificateRenderer {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            template_path: config.template_path.clone(),
            font_path: config.font_path.clone(),
            temp_dir: config.temp_dir.clone(),
            renderer_bin: config.renderer_bin.clone(),
            watermark: config.watermark.clone().filter(|w| !w.is_empty()),
        }
    }

    /// Composite the template, text overlays and QR code into one raster.
    ///
    /// Writes the QR PNG and the intermediate raster into the scratch dir,
    /// tracking both on `temps` before the engine runs so cleanup covers
    /// them even if the invocation is cancelled mid-flight. The engine is
    /// invoked exactly once, with a single filter graph.
    pub async fn render(
        &self,
        validated: &ValidatedRequest,
        temps: &mut TempFiles,
    ) -> Result<PathBuf, RenderError> {
        let request = validated.request();

        if !self.template_path.exists() {
            return Err(RenderError::ResourceMissing {
                asset: format!("template image {}", self.template_path.display()),
            });
        }
        let font = if self.font_path.exists() {
            Some(self.font_path.as_path())
        } else {
            warn!(
                font = %self.font_path.display(),
                "font not found, rendering with the engine default"
            );
            None
        };

        tokio::fs::create_dir_all(&self.temp_dir).await?;

        let qr_path = self
            .temp_dir
            .join(format!("{}_qr.png", request.certificate_id));
        write_qr(&request.certificate_id, &qr_path)?;
        temps.track(qr_path.clone());
        debug!(certificate_id = %request.certificate_id, qr = %qr_path.display(), "QR code written");

        let raster_path = self
            .temp_dir
            .join(format!("{}_temp.jpg", request.certificate_id));
        temps.track(raster_path.clone());

        let filter_graph = build_filter_graph(request, font, self.watermark.as_deref());

        // The attempt runs under the orchestrator's wall-clock limit;
        // killing on drop keeps a timed-out engine from lingering.
        let output = Command::new(&self.renderer_bin)
            .kill_on_drop(true)
            .arg("-y")
            .arg("-i")
            .arg(&self.template_path)
            .arg("-i")
            .arg(&qr_path)
            .arg("-filter_complex")
            .arg(&filter_graph)
            .arg("-q:v")
            .arg("2")
            .arg("-frames:v")
            .arg("1")
            .arg(&raster_path)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RenderError::ResourceMissing {
                        asset: format!("rendering engine `{}`", self.renderer_bin),
                    }
                } else {
                    RenderError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(RenderError::Engine {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(
            certificate_id = %request.certificate_id,
            raster = %raster_path.display(),
            "raster composited"
        );
        Ok(raster_path)
    }
}

/// Escape free text for the engine's overlay syntax.
///
/// Backslash must be replaced first so characters introduced by the later
/// substitutions are not escaped twice.
pub fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
        .replace('"', "\\\"")
        .replace('[', "\\[")
        .replace(']', "\\]")
        .replace(',', "\\,")
        .replace(';', "\\;")
}

/// Format the issue timestamp for printing on the certificate.
///
/// Malformed input renders as a fixed fallback instead of failing the job.
pub fn format_issue_date(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(dt) => dt.format("%d-%b-%Y %H:%M").to_string(),
        None => "Invalid Date".to_string(),
    }
}

/// Build the single filter graph: QR overlay in the bottom-right corner,
/// then one drawtext per field at its fixed position, then the final scale.
fn build_filter_graph(
    request: &CertificateRequest,
    font: Option<&Path>,
    watermark: Option<&str>,
) -> String {
    let font_clause = font
        .map(|path| {
            let escaped = path.display().to_string().replace(' ', "\\ ");
            format!(":fontfile='{escaped}'")
        })
        .unwrap_or_default();

    let name = escape_text(&request.user_name);
    let college = escape_text(&request.college);
    let topic = escape_text(&request.topic);
    let cid = escape_text(&request.certificate_id);
    let date = escape_text(&format_issue_date(&request.issued_at));

    let mut graph = format!(
        "[1:v]scale={QR_SIZE}:{QR_SIZE}[qr];\
         [0:v][qr]overlay=x=W-w-{QR_MARGIN}:y=H-h-{QR_MARGIN}"
    );
    graph.push_str(&format!(
        ",drawtext=text='{name}':x=90:y=880:fontsize=50:fontcolor=black{font_clause}"
    ));
    graph.push_str(&format!(
        ",drawtext=text='{college}':x=90:y=1095:fontsize=45:fontcolor=black{font_clause}"
    ));
    graph.push_str(&format!(
        ",drawtext=text='{topic}':x=90:y=1285:fontsize=40:fontcolor=black{font_clause}"
    ));
    graph.push_str(&format!(
        ",drawtext=text='{cid}':x=1695:y=110:fontsize=20:fontcolor=darkred{font_clause}"
    ));
    graph.push_str(&format!(
        ",drawtext=text='Date\\: {date}':x=1650:y=135:fontsize=25:fontcolor=black{font_clause}"
    ));
    if let Some(mark) = watermark {
        let mark = escape_text(mark);
        graph.push_str(&format!(
            ",drawtext=text='{mark}':x=50:y=50:fontsize=12:fontcolor=gray{font_clause}"
        ));
    }
    graph.push_str(",scale=1500:-1");
    graph
}

/// Write the QR code PNG for a certificate identifier.
///
/// Error correction is set to H so the code stays scannable after JPEG
/// compression and print degradation.
fn write_qr(certificate_id: &str, path: &Path) -> Result<(), RenderError> {
    let payload = format!("Certificate ID: {certificate_id}");
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::H)
        .map_err(|e| RenderError::Qr(e.to_string()))?;
    let image = code
        .render::<image::Rgb<u8>>()
        .module_dimensions(10, 10)
        .dark_color(image::Rgb(QR_DARK))
        .light_color(image::Rgb(QR_LIGHT))
        .build();
    image
        .save(path)
        .map_err(|e| RenderError::Qr(e.to_string()))?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Template, font or engine executable is absent. Not retryable.
    #[error("required asset missing: {asset}")]
    ResourceMissing { asset: String },

    /// The engine ran and failed; carries its diagnostic output.
    #[error("rendering engine failed (exit {status:?}): {stderr}")]
    Engine {
        status: Option<i32>,
        stderr: String,
    },

    #[error("QR code generation failed: {0}")]
    Qr(String),

    #[error("I/O error during rendering: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, RenderError::ResourceMissing { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> CertificateRequest {
        CertificateRequest {
            user_name: "Alice Johnson".to_string(),
            college: "Tech University".to_string(),
            certificate_id: "TEST-0001".to_string(),
            issued_at: "2026-08-07T10:30:00".to_string(),
            topic: "Data Science Fundamentals".to_string(),
            user_id: None,
            test_id: None,
        }
    }

    #[test]
    fn escapes_apostrophes() {
        assert_eq!(
            escape_text("John's Certificate"),
            "John\\'s Certificate"
        );
    }

    #[test]
    fn escapes_backslash_before_other_characters() {
        // Input `a\:b`: the backslash becomes `\\`, then the colon `\:`,
        // never `\\:` from re-escaping the first substitution's output.
        assert_eq!(escape_text(r"a\:b"), r"a\\\:b");
    }

    #[test]
    fn escapes_the_full_character_set() {
        assert_eq!(
            escape_text(r#"a:b'c"d[e]f,g;h"#),
            r#"a\:b\'c\"d\[e\]f\,g\;h"#
        );
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(escape_text("Plain Text 123"), "Plain Text 123");
    }

    #[test]
    fn formats_issue_date() {
        assert_eq!(
            format_issue_date("2026-08-07T10:30:00"),
            "07-Aug-2026 10:30"
        );
    }

    #[test]
    fn malformed_issue_date_falls_back() {
        assert_eq!(format_issue_date("not a date"), "Invalid Date");
    }

    #[test]
    fn filter_graph_draws_every_field_once() {
        let request = sample_request();
        let graph = build_filter_graph(&request, None, Some("Generated by certgen"));

        assert_eq!(graph.matches("drawtext").count(), 6);
        assert!(graph.contains("Alice Johnson"));
        assert!(graph.contains("Tech University"));
        assert!(graph.contains("Data Science Fundamentals"));
        assert!(graph.contains("TEST-0001"));
        assert!(graph.contains("Date\\: 07-Aug-2026 10\\:30"));
        assert!(graph.contains("Generated by certgen"));
        assert!(graph.starts_with("[1:v]scale="));
        assert!(graph.contains("overlay="));
        assert!(graph.ends_with(",scale=1500:-1"));
    }

    #[test]
    fn filter_graph_without_font_or_watermark() {
        let request = sample_request();
        let graph = build_filter_graph(&request, None, None);
        assert_eq!(graph.matches("drawtext").count(), 5);
        assert!(!graph.contains("fontfile"));
    }

    #[test]
    fn filter_graph_escapes_spaces_in_font_path() {
        let request = sample_request();
        let graph = build_filter_graph(
            &request,
            Some(Path::new("fonts/Open Sans Bold.ttf")),
            None,
        );
        assert!(graph.contains("fontfile='fonts/Open\\ Sans\\ Bold.ttf'"));
    }

    #[test]
    fn qr_is_written_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("TEST-0001_qr.png");
        write_qr("TEST-0001", &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
