//! Metamorphosis error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while injecting a runtime bundle.
///
/// Overrides never fail; every variant here belongs to the inject path.
#[derive(Debug, Error)]
pub enum MetamorphosisError {
    /// The archive is missing or not a regular file.
    #[error("bundle archive not found: {}", .path.display())]
    ArchiveNotFound {
        /// Archive path as given.
        path: PathBuf,
    },

    /// The runtime registry directory does not exist.
    #[error("runtime directory not found: {}", .path.display())]
    BaseDirMissing {
        /// Registry directory.
        path: PathBuf,
    },

    /// A version with the requested name is already installed.
    #[error("runtime version already present: {}", .path.display())]
    TargetExists {
        /// Existing version directory.
        path: PathBuf,
    },

    /// The version name is not a single plain path segment.
    #[error("invalid runtime version name '{name}'")]
    InvalidVersionName {
        /// Rejected name.
        name: String,
    },

    /// The archive is neither zip nor gzip-compressed tar.
    #[error("unsupported archive format: {}", .path.display())]
    UnsupportedArchive {
        /// Archive path.
        path: PathBuf,
    },

    /// Reading or unpacking the archive failed.
    #[error("extraction error: {message}")]
    ExtractionError {
        /// Description of the extraction failure.
        message: String,
    },

    /// An entry would land outside the target directory.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path.
        path: String,
    },

    /// Unsafe entry type in archive (symlink, hardlink, device node).
    #[error("unsafe archive entry type '{entry_type}' at {path}")]
    UnsafeEntryType {
        /// The entry type that was rejected.
        entry_type: String,
        /// The path of the entry.
        path: String,
    },

    /// Filesystem operation on the registry failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl MetamorphosisError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    pub(crate) fn extraction(message: impl Into<String>) -> Self {
        Self::ExtractionError {
            message: message.into(),
        }
    }
}

/// Result type for metamorphosis operations.
pub type MetamorphosisResult<T> = Result<T, MetamorphosisError>;
