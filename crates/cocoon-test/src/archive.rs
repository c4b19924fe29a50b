//! Builders for runtime bundle archives.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use zip::write::SimpleFileOptions;

/// Write a zip archive holding `entries` (`path`, `content`).
///
/// Paths ending in `/` become directory entries.
///
/// # Panics
///
/// Panics if the archive cannot be written.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let file = File::create(path).expect("Failed to create zip");
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().unix_permissions(0o644);

    for (name, content) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options)
                .expect("Failed to add zip directory");
        } else {
            zip.start_file(*name, options)
                .expect("Failed to start zip entry");
            zip.write_all(content.as_bytes())
                .expect("Failed to write zip entry");
        }
    }
    zip.finish().expect("Failed to finish zip");
}

/// Write a gzip-compressed tar archive holding `entries` (`path`, `content`).
///
/// # Panics
///
/// Panics if the archive cannot be written.
pub fn write_tar_gz(path: &Path, entries: &[(&str, &str)]) {
    let file = File::create(path).expect("Failed to create tarball");
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, content.as_bytes())
            .expect("Failed to append tar entry");
    }
    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .expect("Failed to finish tarball");
}
