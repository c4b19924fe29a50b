//! Safe extraction of runtime bundle archives.
//!
//! Zip and gzip-compressed tar archives are accepted, detected by their
//! leading bytes rather than the file name. Extraction guards against:
//! - Path traversal (`..` components)
//! - Absolute paths
//! - Links and device nodes in tarballs
//! - Excessive entry counts and extracted sizes

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::debug;

use crate::error::{MetamorphosisError, MetamorphosisResult};

/// Maximum number of entries in a bundle.
const MAX_ENTRY_COUNT: usize = 200_000;

/// Maximum total extracted size (4 GiB).
const MAX_EXTRACTED_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Supported bundle archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// PKZIP archive.
    Zip,
    /// Gzip-compressed tar archive.
    TarGz,
}

impl ArchiveFormat {
    /// Detect the format from the first bytes of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MetamorphosisError::UnsupportedArchive`] for anything else.
    pub fn detect(path: &Path) -> MetamorphosisResult<Self> {
        let mut magic = [0u8; 4];
        let mut file = File::open(path).map_err(MetamorphosisError::io(path))?;
        let read = read_prefix(&mut file, &mut magic).map_err(MetamorphosisError::io(path))?;

        match magic.get(..read) {
            Some([b'P', b'K', 3, 4]) => Ok(Self::Zip),
            Some([0x1f, 0x8b, ..]) => Ok(Self::TarGz),
            _ => Err(MetamorphosisError::UnsupportedArchive {
                path: path.to_path_buf(),
            }),
        }
    }
}

fn read_prefix(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let Some(rest) = buf.get_mut(filled..) else {
            break;
        };
        match reader.read(rest)? {
            0 => break,
            n => filled = filled.saturating_add(n),
        }
    }
    Ok(filled)
}

/// Unpack `archive` into the existing, empty directory `dest`.
///
/// Returns the number of entries written.
///
/// # Errors
///
/// Returns an error on unsupported formats, corrupt archives, unsafe
/// entries or I/O failures. `dest` may hold partial output afterwards.
pub fn extract(archive: &Path, dest: &Path) -> MetamorphosisResult<usize> {
    let format = ArchiveFormat::detect(archive)?;
    debug!(archive = %archive.display(), ?format, "extracting bundle");
    match format {
        ArchiveFormat::Zip => extract_zip(archive, dest),
        ArchiveFormat::TarGz => extract_tar_gz(archive, dest),
    }
}

fn extract_zip(archive: &Path, dest: &Path) -> MetamorphosisResult<usize> {
    let file = File::open(archive).map_err(MetamorphosisError::io(archive))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| MetamorphosisError::extraction(format!("failed to open zip: {e}")))?;

    if zip.len() > MAX_ENTRY_COUNT {
        return Err(MetamorphosisError::extraction(format!(
            "archive exceeds maximum entry count ({MAX_ENTRY_COUNT})"
        )));
    }

    let mut total_size: u64 = 0;
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| MetamorphosisError::extraction(format!("failed to read zip entry: {e}")))?;

        let relative = sanitize_entry_path(Path::new(entry.name()))?;
        let target = dest.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(MetamorphosisError::io(&target))?;
            continue;
        }

        total_size = total_size.saturating_add(entry.size());
        if total_size > MAX_EXTRACTED_SIZE {
            return Err(MetamorphosisError::extraction(format!(
                "archive exceeds maximum extracted size ({MAX_EXTRACTED_SIZE} bytes)"
            )));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(MetamorphosisError::io(parent))?;
        }
        let mut out = File::create(&target).map_err(MetamorphosisError::io(&target))?;
        io::copy(&mut entry, &mut out).map_err(MetamorphosisError::io(&target))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o777))
                .map_err(MetamorphosisError::io(&target))?;
        }
    }

    Ok(zip.len())
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> MetamorphosisResult<usize> {
    let file = File::open(archive).map_err(MetamorphosisError::io(archive))?;
    let mut tar = Archive::new(GzDecoder::new(file));

    let mut entry_count = 0usize;
    let mut total_size: u64 = 0;

    let entries = tar
        .entries()
        .map_err(|e| MetamorphosisError::extraction(format!("failed to read archive entries: {e}")))?;
    for entry_result in entries {
        let mut entry = entry_result
            .map_err(|e| MetamorphosisError::extraction(format!("failed to read archive entry: {e}")))?;

        entry_count = entry_count.saturating_add(1);
        if entry_count > MAX_ENTRY_COUNT {
            return Err(MetamorphosisError::extraction(format!(
                "archive exceeds maximum entry count ({MAX_ENTRY_COUNT})"
            )));
        }

        let entry_type = entry.header().entry_type();
        if !is_safe_entry_type(entry_type) {
            let path = entry
                .path()
                .map_or_else(|_| "<unknown>".to_string(), |p| p.display().to_string());
            return Err(MetamorphosisError::UnsafeEntryType {
                entry_type: format!("{entry_type:?}"),
                path,
            });
        }
        if matches!(
            entry_type,
            tar::EntryType::XHeader | tar::EntryType::XGlobalHeader | tar::EntryType::GNULongName
        ) {
            continue;
        }

        total_size = total_size.saturating_add(entry.header().size().unwrap_or(0));
        if total_size > MAX_EXTRACTED_SIZE {
            return Err(MetamorphosisError::extraction(format!(
                "archive exceeds maximum extracted size ({MAX_EXTRACTED_SIZE} bytes)"
            )));
        }

        let raw = entry
            .path()
            .map_err(|e| MetamorphosisError::extraction(format!("failed to read entry path: {e}")))?
            .into_owned();
        let relative = sanitize_entry_path(&raw)?;
        let target = dest.join(&relative);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(MetamorphosisError::io(parent))?;
        }
        entry.unpack(&target).map_err(|e| {
            MetamorphosisError::extraction(format!("failed to unpack {}: {e}", raw.display()))
        })?;
    }

    Ok(entry_count)
}

/// Tar entry types that may appear in a runtime bundle.
fn is_safe_entry_type(entry_type: tar::EntryType) -> bool {
    matches!(
        entry_type,
        tar::EntryType::Regular
            | tar::EntryType::Directory
            | tar::EntryType::GNULongName
            | tar::EntryType::XHeader
            | tar::EntryType::XGlobalHeader
    )
}

/// Relative path of an entry, with `.` dropped. Absolute paths, drive
/// prefixes and `..` are rejected.
fn sanitize_entry_path(path: &Path) -> MetamorphosisResult<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {},
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(MetamorphosisError::PathTraversal {
                    path: path.display().to_string(),
                });
            },
        }
    }
    Ok(out)
}
