use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Outcome of one retention sweep.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct PurgeStats {
    pub files_removed: u64,
    pub bytes_freed: u64,
}

/// Purge expired files from the certificates store and the scratch store.
///
/// The scratch store uses its own, shorter age threshold. The sweep is
/// partial-failure tolerant: a file that cannot be deleted is logged and
/// skipped, never aborting the rest of the pass.
pub fn purge(
    certificates_dir: &Path,
    temp_dir: &Path,
    max_age_days: u64,
    temp_max_age_hours: u64,
) -> PurgeStats {
    let now = SystemTime::now();
    let cert_cutoff = cutoff(now, Duration::from_secs(max_age_days * 24 * 3600));
    let temp_cutoff = cutoff(now, Duration::from_secs(temp_max_age_hours * 3600));

    let mut stats = purge_dir(certificates_dir, cert_cutoff);
    let temp_stats = purge_dir(temp_dir, temp_cutoff);
    stats.files_removed += temp_stats.files_removed;
    stats.bytes_freed += temp_stats.bytes_freed;

    info!(
        files_removed = stats.files_removed,
        mb_freed = stats.bytes_freed as f64 / (1024.0 * 1024.0),
        "retention sweep complete"
    );
    stats
}

fn cutoff(now: SystemTime, max_age: Duration) -> SystemTime {
    now.checked_sub(max_age).unwrap_or(UNIX_EPOCH)
}

/// Delete every regular file in `dir` whose modification time predates
/// `cutoff`. Missing directories count as empty.
pub fn purge_dir(dir: &Path, cutoff: SystemTime) -> PurgeStats {
    let mut stats = PurgeStats::default();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return stats,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot scan directory for retention");
            return stats;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping entry without metadata");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping entry without mtime");
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                stats.files_removed += 1;
                stats.bytes_freed += metadata.len();
                debug!(path = %path.display(), "removed expired file");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to delete expired file, continuing");
            }
        }
    }

    stats
}
