//! Config file discovery and first-run default generation.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::descriptor::{
    DEFAULT_LOG_NAME, DEFAULT_RUNTIME_BASE, default_cocoon_script, default_runtime_script,
};
use crate::error::ConfigResult;
use crate::keys;
use crate::paths::CocoonPaths;
use crate::settings::Settings;
use crate::types::{LogLevel, SCRIPT_EXTENSION};

/// Architecture subdirectory written into generated configs for 64-bit hosts.
const GENERATED_DIR_64BIT: &str = "x64";
/// Architecture subdirectory written into generated configs for 32-bit hosts.
const GENERATED_DIR_32BIT: &str = "i586";

impl Settings {
    /// Build the settings written on first use of a metamorphosis command.
    ///
    /// The registry under `<wrapper>/runtime` is inspected so the generated
    /// file points at whatever runtime is already unpacked there.
    #[must_use]
    pub fn generate_default(paths: &CocoonPaths, now: DateTime<Utc>) -> Self {
        let mut settings = Self::new();

        settings.set(keys::COCOON, keys::STARTUP, default_cocoon_script());
        settings.set(keys::COCOON, keys::LOG_FILE, DEFAULT_LOG_NAME);
        settings.set(keys::COCOON, keys::LOG_LEVEL, LogLevel::Error.as_str());
        settings.set(keys::COCOON, keys::USE_PIPE, "no");

        let base = paths.absolute(DEFAULT_RUNTIME_BASE);
        let version = find_runtime_version(&base).unwrap_or_default();
        let init_script = find_runtime_script(&base.join(&version))
            .unwrap_or_else(default_runtime_script);

        settings.set(keys::CHRYSALIS, keys::DIR_BASE, DEFAULT_RUNTIME_BASE);
        settings.set(keys::CHRYSALIS, keys::DIR_VERSION, version);
        settings.set(keys::CHRYSALIS, keys::DIR_64BIT, GENERATED_DIR_64BIT);
        settings.set(keys::CHRYSALIS, keys::DIR_32BIT, GENERATED_DIR_32BIT);
        settings.set(keys::CHRYSALIS, keys::INIT_SCRIPT, init_script);

        settings.set(keys::LARVA, keys::APP_DIR, ".");
        settings.set(
            keys::LARVA,
            keys::STARTUP,
            format!("{}.{SCRIPT_EXTENSION}", paths.exe_stem()),
        );

        settings.stamp_metamorphosis(now);
        settings
    }
}

/// Pick the runtime version a generated config should activate.
///
/// A single version directory wins outright; otherwise the most recently
/// modified one does. Hidden directories are staging areas and never count.
#[must_use]
pub fn find_runtime_version(base: &Path) -> Option<String> {
    let entries = std::fs::read_dir(base).ok()?;

    let mut versions: Vec<(String, SystemTime)> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                return None;
            }
            let modified = e
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            Some((name, modified))
        })
        .collect();

    if versions.len() > 1 {
        versions.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    }
    versions.into_iter().next().map(|(name, _)| name)
}

/// First platform script found directly inside a runtime version directory.
#[must_use]
pub fn find_runtime_script(version_dir: &Path) -> Option<String> {
    let entries = std::fs::read_dir(version_dir).ok()?;

    let mut scripts: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| {
            Path::new(name)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION))
        })
        .collect();
    scripts.sort();
    scripts.into_iter().next()
}

/// Load the persisted settings, or `None` when the wrapper has no config file.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_existing(paths: &CocoonPaths) -> ConfigResult<Option<Settings>> {
    let path = paths.config_file();
    if !path.exists() {
        debug!(path = %path.display(), "no config file");
        return Ok(None);
    }
    Settings::load(&path).map(Some)
}

/// Load the persisted settings, writing generated defaults first if the file
/// does not exist yet.
///
/// # Errors
///
/// Returns an error if an existing file cannot be read or parsed, or if the
/// generated defaults cannot be written.
pub fn load_or_create(paths: &CocoonPaths, now: DateTime<Utc>) -> ConfigResult<Settings> {
    if let Some(settings) = load_existing(paths)? {
        return Ok(settings);
    }

    let path = paths.config_file();
    let settings = Settings::generate_default(paths, now);
    settings.save(&path)?;
    info!(path = %path.display(), "created default config");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_find_runtime_version_empty_or_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_runtime_version(dir.path()).is_none());
        assert!(find_runtime_version(&dir.path().join("absent")).is_none());
    }

    #[test]
    fn test_find_runtime_version_single_dir_ignores_hidden_and_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("jre8")).unwrap();
        fs::create_dir(dir.path().join(".inject-staging")).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        assert_eq!(find_runtime_version(dir.path()).as_deref(), Some("jre8"));
    }

    #[test]
    fn test_find_runtime_script() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_runtime_script(dir.path()).is_none());

        fs::write(dir.path().join("readme.txt"), "").unwrap();
        fs::write(dir.path().join(format!("setenv.{SCRIPT_EXTENSION}")), "").unwrap();
        assert_eq!(
            find_runtime_script(dir.path()),
            Some(format!("setenv.{SCRIPT_EXTENSION}"))
        );
    }

    #[test]
    fn test_generate_default() {
        let dir = tempfile::tempdir().unwrap();
        let version_dir = dir.path().join("runtime").join("v1");
        fs::create_dir_all(&version_dir).unwrap();
        fs::write(version_dir.join(format!("boot.{SCRIPT_EXTENSION}")), "").unwrap();

        let paths = CocoonPaths::from_exe(dir.path().join("myapp"));
        let settings = Settings::generate_default(&paths, now());

        assert_eq!(settings.get(keys::COCOON, keys::USE_PIPE).as_deref(), Some("no"));
        assert_eq!(
            settings.get(keys::CHRYSALIS, keys::DIR_VERSION).as_deref(),
            Some("v1")
        );
        assert_eq!(
            settings.get(keys::CHRYSALIS, keys::INIT_SCRIPT),
            Some(format!("boot.{SCRIPT_EXTENSION}"))
        );
        assert_eq!(
            settings.get(keys::CHRYSALIS, keys::DIR_64BIT).as_deref(),
            Some("x64")
        );
        assert_eq!(
            settings.get(keys::LARVA, keys::STARTUP),
            Some(format!("myapp.{SCRIPT_EXTENSION}"))
        );
        assert!(settings.get(keys::METAMORPHOSIS, keys::DATE).is_some());
    }

    #[test]
    fn test_generate_default_without_registry() {
        let dir = tempfile::tempdir().unwrap();
        let paths = CocoonPaths::from_exe(dir.path().join("cocoon"));
        let settings = Settings::generate_default(&paths, now());

        assert_eq!(
            settings.get(keys::CHRYSALIS, keys::DIR_VERSION).as_deref(),
            Some("")
        );
        assert_eq!(
            settings.get(keys::CHRYSALIS, keys::INIT_SCRIPT),
            Some(default_runtime_script())
        );
    }

    #[test]
    fn test_load_or_create_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let paths = CocoonPaths::from_exe(dir.path().join("cocoon"));
        assert!(load_existing(&paths).unwrap().is_none());

        let mut created = load_or_create(&paths, now()).unwrap();
        assert!(paths.config_file().exists());

        created.set(keys::COCOON, keys::LOG_LEVEL, "info");
        created.save(&paths.config_file()).unwrap();

        let loaded = load_or_create(&paths, now()).unwrap();
        assert_eq!(loaded.get(keys::COCOON, keys::LOG_LEVEL).as_deref(), Some("info"));
    }
}
