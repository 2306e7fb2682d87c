//! Temp-directory layout.
//!
//! One temp root per process (`<system temp>/smear`, suffixed `-<n>` if the
//! canonical name is taken), one subdirectory per active job keyed by a hash
//! of its output path. Removal is best effort: failures are logged and
//! swallowed so cleanup can never block shutdown or the next job.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

const TEMP_ROOT_NAME: &str = "smear";
const MAX_ROOT_ATTEMPTS: u32 = 64;

/// Create the process-wide temp root, avoiding collisions with leftovers
/// from other live processes by suffixing an incrementing counter.
pub fn create_temp_root() -> std::io::Result<PathBuf> {
    create_temp_root_in(&std::env::temp_dir())
}

pub fn create_temp_root_in(base: &Path) -> std::io::Result<PathBuf> {
    for attempt in 0..MAX_ROOT_ATTEMPTS {
        let candidate = if attempt == 0 {
            base.join(TEMP_ROOT_NAME)
        } else {
            base.join(format!("{TEMP_ROOT_NAME}-{attempt}"))
        };
        match std::fs::create_dir(&candidate) {
            Ok(()) => {
                tracing::debug!(root = %candidate.display(), "Created temp root");
                return Ok(candidate);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(std::io::Error::other(format!(
        "no free temp root name after {MAX_ROOT_ATTEMPTS} attempts"
    )))
}

/// Per-job temp directory under the root, keyed by a hash of the output path
/// so batch-queuing the same input with different outputs never collides.
pub fn job_temp_dir(temp_root: &Path, output_path: &Path) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    output_path.hash(&mut hasher);
    temp_root.join(format!("render-{:016x}", hasher.finish()))
}

/// Remove a directory tree, logging and swallowing any filesystem error.
/// Safe to call repeatedly; a missing directory is not an error.
pub fn remove_dir_best_effort(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_dir_all(path) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp directory");
    }
}
