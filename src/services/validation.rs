use garde::Validate;

use crate::models::request::{CertificateRequest, ValidatedRequest};

/// Validate a certificate request before any expensive work begins.
///
/// All-or-nothing and side-effect free: a failing request produces one
/// error naming every offending field, not just the first.
pub fn validate(request: &CertificateRequest) -> Result<ValidatedRequest, ValidationError> {
    if let Err(report) = request.validate() {
        let fields = report
            .iter()
            .map(|(path, error)| format!("{path}: {error}"))
            .collect();
        return Err(ValidationError { fields });
    }
    Ok(ValidatedRequest::new(request.clone()))
}

/// Permanent, caller-fault rejection. Never retried.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid certificate request: {}", .fields.join("; "))]
pub struct ValidationError {
    /// One entry per offending field, as `field: reason`.
    pub fields: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> CertificateRequest {
        CertificateRequest {
            user_name: "Deva Garwalla".to_string(),
            college: "Computer Society of India".to_string(),
            certificate_id: "CSI-CERT-20260807-101530".to_string(),
            issued_at: "2026-08-07T10:15:30".to_string(),
            topic: "Advanced Rust Development".to_string(),
            user_id: Some(7),
            test_id: None,
        }
    }

    #[test]
    fn valid_request_passes() {
        let request = sample_request();
        let validated = validate(&request).unwrap();
        assert_eq!(validated.certificate_id(), request.certificate_id);
    }

    #[test]
    fn every_missing_field_is_reported_at_once() {
        let request = CertificateRequest {
            user_name: String::new(),
            college: String::new(),
            topic: String::new(),
            ..sample_request()
        };

        let err = validate(&request).unwrap_err();
        assert_eq!(err.fields.len(), 3);
        for field in ["user_name", "college", "topic"] {
            assert!(
                err.fields.iter().any(|f| f.starts_with(field)),
                "expected {field} in {:?}",
                err.fields
            );
        }
        // And the Display form names them too.
        let message = err.to_string();
        assert!(message.contains("user_name"));
        assert!(message.contains("topic"));
    }

    #[test]
    fn overlong_fields_are_rejected() {
        let request = CertificateRequest {
            user_name: "x".repeat(101),
            ..sample_request()
        };
        let err = validate(&request).unwrap_err();
        assert!(err.fields.iter().any(|f| f.starts_with("user_name")));

        let request = CertificateRequest {
            topic: "x".repeat(151),
            ..sample_request()
        };
        assert!(validate(&request).is_err());
    }

    #[test]
    fn certificate_id_charset_and_length_are_enforced() {
        let request = CertificateRequest {
            certificate_id: "AB 1!".to_string(),
            ..sample_request()
        };
        let err = validate(&request).unwrap_err();
        assert!(err.fields.iter().any(|f| f.starts_with("certificate_id")));

        let request = CertificateRequest {
            certificate_id: "AB-1".to_string(),
            ..sample_request()
        };
        assert!(validate(&request).is_err());

        let request = CertificateRequest {
            certificate_id: "ab_c-1234".to_string(),
            ..sample_request()
        };
        assert!(validate(&request).is_ok());
    }

    #[test]
    fn malformed_timestamp_is_rejected() {
        let request = CertificateRequest {
            issued_at: "yesterday".to_string(),
            ..sample_request()
        };
        let err = validate(&request).unwrap_err();
        assert!(err.fields.iter().any(|f| f.starts_with("issued_at")));
    }

    #[test]
    fn timestamp_with_offset_is_accepted() {
        let request = CertificateRequest {
            issued_at: "2026-08-07T10:15:30+05:30".to_string(),
            ..sample_request()
        };
        assert!(validate(&request).is_ok());
    }

    #[test]
    fn validation_has_no_side_effects() {
        let request = sample_request();
        let before = serde_json::to_string(&request).unwrap();
        let _ = validate(&request);
        assert_eq!(serde_json::to_string(&request).unwrap(), before);
    }
}
