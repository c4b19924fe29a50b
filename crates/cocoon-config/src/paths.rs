//! Wrapper location and path conventions.

use std::path::{Component, Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};

/// Paths derived from the wrapper executable.
///
/// Every relative path in the configuration is interpreted against
/// [`CocoonPaths::dir`], never against the current working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CocoonPaths {
    exe: PathBuf,
    dir: PathBuf,
}

impl CocoonPaths {
    /// Paths for the running executable.
    ///
    /// # Errors
    ///
    /// Returns an error if the executable location cannot be determined.
    pub fn current() -> ConfigResult<Self> {
        let exe = std::env::current_exe().map_err(ConfigError::NoExecutable)?;
        Ok(Self::from_exe(exe))
    }

    /// Paths for an explicit executable location.
    pub fn from_exe(exe: impl Into<PathBuf>) -> Self {
        let exe = normalize(&exe.into());
        let dir = exe
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self { exe, dir }
    }

    /// Absolute path of the wrapper executable.
    #[must_use]
    pub fn exe(&self) -> &Path {
        &self.exe
    }

    /// Directory holding the wrapper executable.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Executable file name without its extension (`cocoon` for `cocoon.exe`).
    #[must_use]
    pub fn exe_stem(&self) -> String {
        self.exe
            .file_stem()
            .map_or_else(|| "cocoon".to_owned(), |s| s.to_string_lossy().into_owned())
    }

    /// Sibling of the executable sharing its stem, with another extension.
    #[must_use]
    pub fn asset_name(&self, extension: &str) -> PathBuf {
        self.exe.with_extension(extension)
    }

    /// Persisted configuration file (`<exe-stem>.toml` next to the executable).
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.asset_name("toml")
    }

    /// Resolve `path` against the wrapper directory unless it is already absolute.
    #[must_use]
    pub fn absolute(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&self.dir.join(path))
        }
    }
}

/// Lexically clean a path: drop `.` components and fold `..` into its parent.
///
/// The filesystem is not consulted, so symlinks are not resolved.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
