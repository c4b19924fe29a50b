//! Removal of superseded runtime versions.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Outcome of [`prune_except`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    /// Directories deleted.
    pub removed: Vec<PathBuf>,
    /// Directories that could not be deleted, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl PruneReport {
    /// Whether every sibling was deleted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete every version directory under `base` except `keep`.
///
/// Best effort: failures are logged and reported, never returned as errors.
/// Plain files and hidden directories (in-flight injection staging areas)
/// in `base` are left alone.
#[must_use]
pub fn prune_except(base: &Path, keep: &str) -> PruneReport {
    let mut report = PruneReport::default();

    let entries = match fs::read_dir(base) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(base = %base.display(), error = %e, "cannot list runtime versions");
            report.failed.push((base.to_path_buf(), e.to_string()));
            return report;
        },
    };

    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
        let name = entry.file_name();
        if !is_dir || name == keep || name.to_string_lossy().starts_with('.') {
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                info!(path = %path.display(), "removed runtime version");
                report.removed.push(path);
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove runtime version");
                report.failed.push((path, e.to_string()));
            },
        }
    }

    report
}
