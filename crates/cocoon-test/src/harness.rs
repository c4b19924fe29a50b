//! Wrapper directory fixture.

use std::fs;
use std::path::{Path, PathBuf};

use cocoon_config::{CocoonPaths, SCRIPT_EXTENSION};
use tempfile::TempDir;

/// A temporary directory laid out like an installed wrapper.
///
/// The wrapper executable itself is never created; only its path matters
/// for name derivation.
#[derive(Debug)]
pub struct CocoonFixture {
    dir: TempDir,
    stem: String,
}

impl CocoonFixture {
    /// Fixture for a wrapper named `stem`.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new(stem: &str) -> Self {
        Self {
            dir: TempDir::with_prefix("cocoon-").expect("Failed to create temp directory"),
            stem: stem.to_string(),
        }
    }

    /// Wrapper directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the (virtual) wrapper executable.
    #[must_use]
    pub fn exe(&self) -> PathBuf {
        if cfg!(windows) {
            self.dir.path().join(format!("{}.exe", self.stem))
        } else {
            self.dir.path().join(&self.stem)
        }
    }

    /// Paths derived from the wrapper executable.
    #[must_use]
    pub fn paths(&self) -> CocoonPaths {
        CocoonPaths::from_exe(self.exe())
    }

    /// Path of the wrapper's configuration file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.paths().config_file()
    }

    /// Write `content` to `relative`, creating parent directories.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_file(&self, relative: impl AsRef<Path>, content: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Write a platform script named `<name>.<ext>` under `dir`.
    ///
    /// `body` is written as-is, so it must use the platform's shell syntax.
    pub fn write_script(&self, dir: impl AsRef<Path>, name: &str, body: &str) -> PathBuf {
        self.write_file(
            dir.as_ref().join(format!("{name}.{SCRIPT_EXTENSION}")),
            body,
        )
    }

    /// Write the wrapper's configuration file.
    pub fn write_config(&self, toml: &str) -> PathBuf {
        self.write_file(self.config_path(), toml)
    }

    /// Read the wrapper's configuration file back.
    ///
    /// # Panics
    ///
    /// Panics if the file does not exist.
    #[must_use]
    pub fn read_config(&self) -> String {
        fs::read_to_string(self.config_path()).expect("Failed to read configuration")
    }

    /// Create `relative` as a directory.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    pub fn create_dir(&self, relative: impl AsRef<Path>) -> PathBuf {
        let path = self.dir.path().join(relative);
        fs::create_dir_all(&path).expect("Failed to create directory");
        path
    }

    /// Names of the directories directly under `relative`, sorted.
    ///
    /// # Panics
    ///
    /// Panics if `relative` cannot be read.
    #[must_use]
    pub fn subdirs(&self, relative: impl AsRef<Path>) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.dir.path().join(relative))
            .expect("Failed to read directory")
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
