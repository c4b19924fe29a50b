//! Bundle descriptor: the fully resolved launch plan for one invocation.

use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::keys;
use crate::paths::CocoonPaths;
use crate::settings::Settings;
use crate::types::{Architecture, LogLevel, SCRIPT_EXTENSION, is_enabled};

/// Default capture/log file prefix.
pub const DEFAULT_LOG_NAME: &str = "CocoonProcess";
/// Default registry base directory, relative to the wrapper directory.
pub const DEFAULT_RUNTIME_BASE: &str = "runtime";
/// Default application directory, relative to the wrapper directory.
pub const DEFAULT_APP_DIR: &str = ".";

/// Default wrapper preparation script name.
#[must_use]
pub fn default_cocoon_script() -> String {
    format!("cocoon_init.{SCRIPT_EXTENSION}")
}

/// Default runtime initialization script name.
#[must_use]
pub fn default_runtime_script() -> String {
    format!("init.{SCRIPT_EXTENSION}")
}

/// Default application startup script name.
#[must_use]
pub fn default_app_script() -> String {
    format!("larva.{SCRIPT_EXTENSION}")
}

/// Fully resolved description of the bundle to launch.
///
/// Built fresh on every invocation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleDescriptor {
    /// Detected host word size.
    pub architecture: Architecture,
    /// Directory of the wrapper executable.
    pub cocoon_path: PathBuf,
    /// Wrapper preparation script, run first when it exists.
    pub cocoon_startup_script: Option<PathBuf>,
    /// Whether to open the rendezvous channel for the child.
    pub use_pipe: bool,
    /// Architecture-specific directory of the active runtime version.
    pub runtime_path: Option<PathBuf>,
    /// Runtime initialization script, run second when it exists.
    pub runtime_startup_script: Option<PathBuf>,
    /// Application directory; the child's working directory.
    pub app_path: PathBuf,
    /// Application startup script. Mandatory.
    pub app_startup_script: PathBuf,
    /// Override directory for output capture.
    pub log_path: Option<PathBuf>,
    /// Capture file prefix.
    pub log_name: String,
    /// Wrapper log verbosity.
    pub log_level: LogLevel,
}

impl BundleDescriptor {
    /// Resolve persisted settings into a descriptor.
    ///
    /// Never fails: every absent or empty setting has a default. Existence of
    /// the referenced paths is checked separately by [`Self::validate`].
    #[must_use]
    pub fn resolve(settings: &Settings, paths: &CocoonPaths, architecture: Architecture) -> Self {
        let version_dir = runtime_version_dir(settings);

        let arch_dir = settings.value_or(
            keys::CHRYSALIS,
            architecture.dir_key(),
            architecture.label(),
        );
        let runtime_path = paths.absolute(version_dir.join(arch_dir));

        let runtime_script = settings.value_or(
            keys::CHRYSALIS,
            keys::INIT_SCRIPT,
            &default_runtime_script(),
        );
        let runtime_startup_script = paths.absolute(version_dir.join(runtime_script));

        let app_path = paths.absolute(settings.value_or(keys::LARVA, keys::APP_DIR, DEFAULT_APP_DIR));
        let app_script = settings.value_or(keys::LARVA, keys::STARTUP, &default_app_script());
        let app_startup_script = paths.absolute(app_path.join(app_script));

        let cocoon_script =
            settings.value_or(keys::COCOON, keys::STARTUP, &default_cocoon_script());

        let log_path = settings
            .get(keys::COCOON, keys::LOG_DIR)
            .filter(|v| !v.is_empty())
            .map(|dir| paths.absolute(dir));

        Self {
            architecture,
            cocoon_path: paths.dir().to_path_buf(),
            cocoon_startup_script: Some(paths.absolute(cocoon_script)),
            use_pipe: is_enabled(&settings.value_or(keys::COCOON, keys::USE_PIPE, "false")),
            runtime_path: Some(runtime_path),
            runtime_startup_script: Some(runtime_startup_script),
            app_path,
            app_startup_script,
            log_path,
            log_name: settings.value_or(keys::COCOON, keys::LOG_FILE, DEFAULT_LOG_NAME),
            log_level: LogLevel::parse_lenient(&settings.value_or(
                keys::COCOON,
                keys::LOG_LEVEL,
                LogLevel::Error.as_str(),
            )),
        }
    }

    /// Minimal descriptor for a wrapper started without any configuration file.
    ///
    /// The application directory is the wrapper directory, there is no runtime
    /// and no wrapper preparation script. Performs no filesystem checks.
    #[must_use]
    pub fn default_for(
        paths: &CocoonPaths,
        app_startup_script: impl AsRef<Path>,
        architecture: Architecture,
    ) -> Self {
        Self {
            architecture,
            cocoon_path: paths.dir().to_path_buf(),
            cocoon_startup_script: None,
            use_pipe: false,
            runtime_path: None,
            runtime_startup_script: None,
            app_path: paths.dir().to_path_buf(),
            app_startup_script: paths.absolute(app_startup_script),
            log_path: None,
            log_name: paths.exe_stem(),
            log_level: LogLevel::Error,
        }
    }

    /// Directory that receives the output capture files.
    #[must_use]
    pub fn output_path(&self) -> &Path {
        self.log_path.as_deref().unwrap_or(&self.app_path)
    }

    /// Check that every required path exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBundle`] naming every missing path.
    pub fn validate(self) -> ConfigResult<ValidatedBundle> {
        let mut problems = Vec::new();

        let mut require = |field: &str, path: &Path| {
            if !path.exists() {
                problems.push(format!("{field}: {} does not exist", path.display()));
            }
        };
        require("cocoon path", &self.cocoon_path);
        if let Some(runtime) = &self.runtime_path {
            require("chrysalis path", runtime);
        }
        require("larva path", &self.app_path);
        require("larva startup script", &self.app_startup_script);

        if problems.is_empty() {
            Ok(ValidatedBundle(self))
        } else {
            Err(ConfigError::InvalidBundle { problems })
        }
    }
}

impl fmt::Display for BundleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show(path: Option<&PathBuf>) -> String {
            path.map_or_else(|| "-".to_owned(), |p| p.display().to_string())
        }

        writeln!(f, "Arch: {}", self.architecture)?;
        writeln!(f, "Cocoon path: {}", self.cocoon_path.display())?;
        writeln!(f, "Cocoon init script: {}", show(self.cocoon_startup_script.as_ref()))?;
        writeln!(f, "Cocoon use pipes: {}", self.use_pipe)?;
        writeln!(f, "Chrysalis path: {}", show(self.runtime_path.as_ref()))?;
        writeln!(f, "Chrysalis init script: {}", show(self.runtime_startup_script.as_ref()))?;
        writeln!(f, "Larva path: {}", self.app_path.display())?;
        writeln!(f, "Larva startup script: {}", self.app_startup_script.display())?;
        write!(f, "Output path: {}", self.output_path().display())
    }
}

/// A descriptor whose required paths were confirmed to exist.
///
/// The supervisor only accepts this type, so a launch can never start from a
/// descriptor that skipped validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBundle(BundleDescriptor);

impl ValidatedBundle {
    /// Give back the underlying descriptor.
    #[must_use]
    pub fn into_inner(self) -> BundleDescriptor {
        self.0
    }
}

impl Deref for ValidatedBundle {
    type Target = BundleDescriptor;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// `<dir.base>/<dir.version>`, relative to the wrapper directory.
fn runtime_version_dir(settings: &Settings) -> PathBuf {
    let base = settings.value_or(keys::CHRYSALIS, keys::DIR_BASE, DEFAULT_RUNTIME_BASE);
    let version = settings.value_or(keys::CHRYSALIS, keys::DIR_VERSION, "");
    Path::new(&base).join(version)
}

/// Absolute registry base directory (`chrysalis.dir.base`).
#[must_use]
pub fn runtime_base_dir(settings: &Settings, paths: &CocoonPaths) -> PathBuf {
    paths.absolute(settings.value_or(keys::CHRYSALIS, keys::DIR_BASE, DEFAULT_RUNTIME_BASE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths_in(dir: &Path) -> CocoonPaths {
        CocoonPaths::from_exe(dir.join("cocoon"))
    }

    #[test]
    fn test_resolve_empty_settings_uses_defaults() {
        let root = std::env::temp_dir().join("cocoon-resolve");
        let paths = paths_in(&root);
        let d = BundleDescriptor::resolve(&Settings::new(), &paths, Architecture::Bits64);

        assert_eq!(d.cocoon_path, root);
        assert_eq!(
            d.cocoon_startup_script,
            Some(root.join(default_cocoon_script()))
        );
        assert!(!d.use_pipe);
        assert_eq!(d.runtime_path, Some(root.join("runtime").join("64bit")));
        assert_eq!(
            d.runtime_startup_script,
            Some(root.join("runtime").join(default_runtime_script()))
        );
        assert_eq!(d.app_path, root);
        assert_eq!(d.app_startup_script, root.join(default_app_script()));
        assert_eq!(d.log_name, DEFAULT_LOG_NAME);
        assert_eq!(d.log_level, LogLevel::Error);
        assert!(d.log_path.is_none());
    }

    #[test]
    fn test_resolve_configured_values() {
        let root = std::env::temp_dir().join("cocoon-resolve-configured");
        let paths = paths_in(&root);
        let settings = Settings::parse(
            r#"
            [cocoon]
            startup = "prepare.sh"
            "log.level" = "info"
            "log.file" = "MyApp"
            "log.dir" = "out"
            usepipe = "YES"

            [chrysalis]
            "dir.base" = "jre"
            "dir.version" = "8u172"
            "dir.32bit" = "i586"
            initscript = "setenv.sh"

            [larva]
            appdir = "app"
            startup = "run.sh"
            "#,
            "test",
        )
        .unwrap();

        let d = BundleDescriptor::resolve(&settings, &paths, Architecture::Bits32);
        assert_eq!(d.cocoon_startup_script, Some(root.join("prepare.sh")));
        assert!(d.use_pipe);
        assert_eq!(d.runtime_path, Some(root.join("jre/8u172/i586")));
        assert_eq!(
            d.runtime_startup_script,
            Some(root.join("jre/8u172/setenv.sh"))
        );
        assert_eq!(d.app_path, root.join("app"));
        assert_eq!(d.app_startup_script, root.join("app/run.sh"));
        assert_eq!(d.log_path, Some(root.join("out")));
        assert_eq!(d.output_path(), root.join("out"));
        assert_eq!(d.log_name, "MyApp");
        assert_eq!(d.log_level, LogLevel::Info);
    }

    #[test]
    fn test_arch_dir_falls_back_to_label() {
        let root = std::env::temp_dir().join("cocoon-resolve-arch");
        let settings =
            Settings::parse("[chrysalis]\n\"dir.version\" = \"v1\"\n\"dir.64bit\" = \"\"\n", "t")
                .unwrap();
        let d = BundleDescriptor::resolve(&settings, &paths_in(&root), Architecture::Bits64);
        assert_eq!(d.runtime_path, Some(root.join("runtime/v1/64bit")));
    }

    #[test]
    fn test_default_descriptor() {
        let root = std::env::temp_dir().join("cocoon-default");
        let paths = paths_in(&root);
        let d = BundleDescriptor::default_for(&paths, "cocoon.sh", Architecture::Bits64);

        assert_eq!(d.app_path, root);
        assert_eq!(d.app_startup_script, root.join("cocoon.sh"));
        assert!(d.runtime_path.is_none());
        assert!(d.runtime_startup_script.is_none());
        assert!(d.cocoon_startup_script.is_none());
        assert!(!d.use_pipe);
    }

    #[test]
    fn test_validate_reports_every_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        let d = BundleDescriptor::resolve(&Settings::new(), &paths, Architecture::Bits64);

        let err = d.validate().unwrap_err();
        let ConfigError::InvalidBundle { problems } = err else {
            panic!("expected InvalidBundle");
        };
        assert_eq!(problems.len(), 2);
        assert!(problems[0].starts_with("chrysalis path"));
        assert!(problems[1].starts_with("larva startup script"));
    }

    #[test]
    fn test_validate_accepts_complete_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        std::fs::create_dir_all(dir.path().join("runtime/64bit")).unwrap();
        std::fs::write(dir.path().join(default_app_script()), "").unwrap();

        let d = BundleDescriptor::resolve(&Settings::new(), &paths, Architecture::Bits64);
        let validated = d.clone().validate().unwrap();
        assert_eq!(*validated, d);
    }

    #[test]
    fn test_default_descriptor_validation_skips_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        std::fs::write(dir.path().join("cocoon.sh"), "").unwrap();

        let d = BundleDescriptor::default_for(&paths, "cocoon.sh", Architecture::Bits32);
        assert!(d.validate().is_ok());
    }
}
