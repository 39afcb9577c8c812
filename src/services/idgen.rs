use chrono::Utc;
use uuid::Uuid;

const DEFAULT_PREFIX: &str = "CERT";

/// Generate a certificate identifier with the default prefix.
pub fn generate() -> String {
    generate_with_prefix(DEFAULT_PREFIX)
}

/// Generate a certificate identifier: `PREFIX-YYYYMMDD-HHMMSS-XXXXXXXX`.
///
/// The UTC second timestamp keeps identifiers sortable; the random suffix
/// keeps concurrent submissions within the same second collision-resistant.
/// Output always satisfies the validator's identifier rule.
pub fn generate_with_prefix(prefix: &str) -> String {
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let entropy = Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase();
    format!("{prefix}-{stamp}-{entropy}")
}
