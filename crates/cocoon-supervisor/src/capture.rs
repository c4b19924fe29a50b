//! Output capture: the child's stdout and stderr go to append-only files.
//!
//! Files are `<prefix>.stdout` and `<prefix>.stderr` inside the output
//! directory, or inside its `logs` subdirectory when one exists. Rotation
//! happens when the files are opened: an oversized file is compressed into
//! `<file>.1.gz`, older backups shift up, and backups past the age limit are
//! removed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, SystemTime};

use chrono::Local;
use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, warn};

use crate::error::{SupervisorError, SupervisorResult};

/// Subdirectory preferred for capture files when present.
pub const LOGS_SUBDIR: &str = "logs";

const DEFAULT_MAX_BYTES: u64 = 1024 * 1024;
const DEFAULT_MAX_BACKUPS: usize = 3;
const DEFAULT_MAX_AGE_SECS: u64 = 28 * 24 * 60 * 60;

/// When and how capture files are rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RotationPolicy {
    /// Size at which a file is rotated on open.
    pub(crate) max_bytes: u64,
    /// Compressed backups kept per file.
    pub(crate) max_backups: usize,
    /// Backups older than this are deleted.
    pub(crate) max_age: Duration,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_backups: DEFAULT_MAX_BACKUPS,
            max_age: Duration::from_secs(DEFAULT_MAX_AGE_SECS),
        }
    }
}

/// Location and rotation settings for one launch's capture files.
#[derive(Debug, Clone)]
pub struct OutputCapture {
    dir: PathBuf,
    prefix: String,
    policy: RotationPolicy,
}

impl OutputCapture {
    /// Capture into `output_dir` (or its `logs` subdirectory) using `prefix`.
    #[must_use]
    pub fn new(output_dir: &Path, prefix: impl Into<String>) -> Self {
        Self {
            dir: resolve_dir(output_dir),
            prefix: prefix.into(),
            policy: RotationPolicy::default(),
        }
    }

    /// Directory the files are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<prefix>.stdout`
    #[must_use]
    pub fn stdout_path(&self) -> PathBuf {
        self.dir.join(format!("{}.stdout", self.prefix))
    }

    /// `<dir>/<prefix>.stderr`
    #[must_use]
    pub fn stderr_path(&self) -> PathBuf {
        self.dir.join(format!("{}.stderr", self.prefix))
    }

    /// Rotate if needed, open both files for appending and write the
    /// "attached" marker to each.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Capture`] if either file cannot be opened
    /// or written.
    pub fn open(&self) -> SupervisorResult<CaptureFiles> {
        let stdout_path = self.stdout_path();
        let stderr_path = self.stderr_path();

        let stdout = open_stream(&stdout_path, "stdout", &self.policy)?;
        let stderr = open_stream(&stderr_path, "stderr", &self.policy)?;

        debug!(dir = %self.dir.display(), prefix = %self.prefix, "output capture open");
        Ok(CaptureFiles {
            stdout_path,
            stderr_path,
            stdout,
            stderr,
        })
    }
}

/// Open capture files for one launch.
#[derive(Debug)]
pub struct CaptureFiles {
    stdout_path: PathBuf,
    stderr_path: PathBuf,
    stdout: File,
    stderr: File,
}

impl CaptureFiles {
    /// Path of the stdout capture.
    #[must_use]
    pub fn stdout_path(&self) -> &Path {
        &self.stdout_path
    }

    /// Path of the stderr capture.
    #[must_use]
    pub fn stderr_path(&self) -> &Path {
        &self.stderr_path
    }

    /// Handles for the child's stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns an error if the file handles cannot be duplicated.
    pub fn child_stdio(&self) -> SupervisorResult<(Stdio, Stdio)> {
        let out = clone_handle(&self.stdout, &self.stdout_path)?;
        let err = clone_handle(&self.stderr, &self.stderr_path)?;
        Ok((Stdio::from(out), Stdio::from(err)))
    }

    /// A writer into the stderr capture, for the wrapper's own diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if the file handle cannot be duplicated.
    pub fn diagnostics(&self) -> SupervisorResult<File> {
        clone_handle(&self.stderr, &self.stderr_path)
    }

    /// Flush both files to disk.
    pub fn sync(&self) {
        let _ = self.stdout.sync_all();
        let _ = self.stderr.sync_all();
    }
}

/// `<out>/logs` when that directory exists, `<out>` otherwise.
#[must_use]
pub fn resolve_dir(output_dir: &Path) -> PathBuf {
    let logs = output_dir.join(LOGS_SUBDIR);
    if logs.is_dir() { logs } else { output_dir.to_path_buf() }
}

fn capture_err(path: &Path) -> impl FnOnce(io::Error) -> SupervisorError + '_ {
    move |source| SupervisorError::Capture {
        path: path.to_path_buf(),
        source,
    }
}

fn clone_handle(file: &File, path: &Path) -> SupervisorResult<File> {
    file.try_clone().map_err(capture_err(path))
}

fn open_stream(path: &Path, stream: &str, policy: &RotationPolicy) -> SupervisorResult<File> {
    if let Err(e) = rotate_if_needed(path, policy) {
        warn!(path = %path.display(), error = %e, "capture rotation failed");
    }
    prune_expired(path, policy);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(capture_err(path))?;

    let marker = format!("{} {stream} attached\n", Local::now().format("%Y/%m/%d %H:%M:%S"));
    file.write_all(marker.as_bytes())
        .map_err(capture_err(path))?;
    Ok(file)
}

fn backup_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{index}.gz"));
    PathBuf::from(name)
}

/// Compress `path` into `.1.gz` when it reached the size limit, shifting
/// older backups up and dropping the one past `max_backups`.
pub(crate) fn rotate_if_needed(path: &Path, policy: &RotationPolicy) -> io::Result<bool> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if size < policy.max_bytes {
        return Ok(false);
    }

    if policy.max_backups == 0 {
        fs::remove_file(path)?;
        return Ok(true);
    }

    let oldest = backup_path(path, policy.max_backups);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for index in (1..policy.max_backups).rev() {
        let from = backup_path(path, index);
        if from.exists() {
            fs::rename(&from, backup_path(path, index.saturating_add(1)))?;
        }
    }

    let mut source = File::open(path)?;
    let target = File::create(backup_path(path, 1))?;
    let mut encoder = GzEncoder::new(target, Compression::default());
    io::copy(&mut source, &mut encoder)?;
    encoder.finish()?.sync_all()?;
    drop(source);
    fs::remove_file(path)?;

    debug!(path = %path.display(), size, "rotated capture file");
    Ok(true)
}

/// Delete backups of `path` whose modification time is past `max_age`.
pub(crate) fn prune_expired(path: &Path, policy: &RotationPolicy) {
    let Some(cutoff) = SystemTime::now().checked_sub(policy.max_age) else {
        return;
    };
    for index in 1..=policy.max_backups {
        let backup = backup_path(path, index);
        let expired = fs::metadata(&backup)
            .and_then(|m| m.modified())
            .is_ok_and(|modified| modified < cutoff);
        if expired && let Err(e) = fs::remove_file(&backup) {
            warn!(path = %backup.display(), error = %e, "failed to remove expired capture backup");
        }
    }
}
