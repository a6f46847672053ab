//! Shared audio utilities.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Seconds since UNIX epoch with sub-second precision.
/// Cache metadata stores timestamps in this form.
#[inline]
pub(crate) fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Generate a simple unique id based on current time in nanoseconds.
/// Suffixed onto artifact names so concurrent chunks never collide.
#[inline]
pub(crate) fn gen_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{:x}", nanos)
}

/// Local timestamp used in artifact file names, e.g. `20240611_101500_123456`.
pub(crate) fn file_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S_%6f").to_string()
}

/// Resolve a binary by name on `PATH`, or accept an explicit path.
pub fn get_from_path(bin: &str) -> Option<PathBuf> {
    // If a path-like string is provided, respect it directly
    if bin.contains(std::path::MAIN_SEPARATOR) {
        let p = PathBuf::from(bin);
        return if p.exists() { Some(p) } else { None };
    }

    if let Some(paths_os) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths_os) {
            let candidate = dir.join(bin);
            if candidate.exists() {
                return Some(candidate);
            }
            if cfg!(windows) {
                let exe = dir.join(format!("{bin}.exe"));
                if exe.exists() {
                    return Some(exe);
                }
            }
        }
    }
    None
}

/// Delete a file, logging instead of failing.
///
/// Returns `true` when the file is gone afterwards (including when it never
/// existed). A failed deletion must never abort a cache or cleanup operation,
/// so callers decide whether the `false` case matters.
pub fn remove_file_best_effort(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(target: "audio_utils", path = %path.display(), "Removed file");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(target: "audio_utils", path = %path.display(), error = %e, "Failed to remove file");
            false
        }
    }
}
