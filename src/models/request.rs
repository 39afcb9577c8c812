use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

/// Request to generate one certificate.
///
/// Required string fields carry `#[serde(default)]` so that a field absent
/// from the payload and a field present-but-empty fail validation the same
/// way, and one report can name all of them at once.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CertificateRequest {
    /// Recipient name as printed on the certificate
    #[serde(default)]
    #[garde(length(min = 1, max = 100))]
    pub user_name: String,

    /// Issuing institution
    #[serde(default)]
    #[garde(length(min = 1, max = 200))]
    pub college: String,

    /// Unique certificate identifier; also encoded in the QR code
    #[serde(default)]
    #[garde(custom(valid_certificate_id))]
    pub certificate_id: String,

    /// Issue timestamp, ISO-8601
    #[serde(default)]
    #[garde(custom(parseable_timestamp))]
    pub issued_at: String,

    /// Course or event topic
    #[serde(default)]
    #[garde(length(min = 1, max = 150))]
    pub topic: String,

    /// Opaque caller reference, passed through unvalidated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub user_id: Option<i64>,

    /// Opaque caller reference, passed through unvalidated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub test_id: Option<i64>,
}

fn valid_certificate_id(value: &str, _context: &()) -> garde::Result {
    if value.len() < 5 {
        return Err(garde::Error::new("must be at least 5 characters"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(garde::Error::new(
            "may only contain letters, digits, hyphen and underscore",
        ));
    }
    Ok(())
}

fn parseable_timestamp(value: &str, _context: &()) -> garde::Result {
    match parse_timestamp(value) {
        Some(_) => Ok(()),
        None => Err(garde::Error::new("must be an ISO-8601 timestamp")),
    }
}

/// Parse an ISO-8601 timestamp, with or without an offset.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }
    None
}

/// A certificate request that passed validation.
///
/// Only `services::validation::validate` constructs this, so downstream
/// stages can take it as proof that the request was checked.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    request: CertificateRequest,
}

impl ValidatedRequest {
    pub(crate) fn new(request: CertificateRequest) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &CertificateRequest {
        &self.request
    }

    pub fn certificate_id(&self) -> &str {
        &self.request.certificate_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_deserialize_as_empty() {
        let request: CertificateRequest = serde_json::from_str(r#"{"user_name":"Ada"}"#).unwrap();
        assert_eq!(request.user_name, "Ada");
        assert!(request.college.is_empty());
        assert!(request.certificate_id.is_empty());
        assert!(request.topic.is_empty());
        assert!(request.user_id.is_none());
    }

    #[test]
    fn parses_rfc3339_and_naive_timestamps() {
        assert!(parse_timestamp("2026-08-07T10:30:00+05:30").is_some());
        assert!(parse_timestamp("2026-08-07T10:30:00").is_some());
        assert!(parse_timestamp("2026-08-07T10:30:00.123456").is_some());
        assert!(parse_timestamp("2026-08-07T10:30").is_some());
        assert!(parse_timestamp("2026-08-07").is_some());
    }

    #[test]
    fn rejects_malformed_timestamps() {
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("07/08/2026").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
