//! `morph`: apply command-line overrides to persisted settings.

use std::path::Path;

use cocoon_config::descriptor::runtime_base_dir;
use cocoon_config::{CocoonPaths, Settings, keys};
use tracing::{debug, warn};

/// Setting touched by one override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideField {
    /// `cocoon.startup`
    CocoonStartup,
    /// `cocoon.log.level`
    CocoonLogLevel,
    /// `cocoon.log.file`
    CocoonLogName,
    /// `cocoon.usepipe`
    CocoonUsePipe,
    /// `chrysalis.dir.version`, with descriptor cascade.
    ChrysalisDir,
    /// `larva.startup`
    LarvaStartup,
}

impl OverrideField {
    /// Every field, in the order overrides are applied.
    pub const ALL: [Self; 6] = [
        Self::CocoonStartup,
        Self::CocoonLogLevel,
        Self::CocoonLogName,
        Self::CocoonUsePipe,
        Self::ChrysalisDir,
        Self::LarvaStartup,
    ];

    /// Settings section.
    #[must_use]
    pub fn section(self) -> &'static str {
        match self {
            Self::CocoonStartup | Self::CocoonLogLevel | Self::CocoonLogName | Self::CocoonUsePipe => {
                keys::COCOON
            },
            Self::ChrysalisDir => keys::CHRYSALIS,
            Self::LarvaStartup => keys::LARVA,
        }
    }

    /// Key within [`Self::section`].
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::CocoonStartup | Self::LarvaStartup => keys::STARTUP,
            Self::CocoonLogLevel => keys::LOG_LEVEL,
            Self::CocoonLogName => keys::LOG_FILE,
            Self::CocoonUsePipe => keys::USE_PIPE,
            Self::ChrysalisDir => keys::DIR_VERSION,
        }
    }

    /// Command-line flag carrying the override.
    #[must_use]
    pub fn flag(self) -> &'static str {
        match self {
            Self::CocoonStartup => "--cocoon-startup",
            Self::CocoonLogLevel => "--cocoon-loglevel",
            Self::CocoonLogName => "--cocoon-logname",
            Self::CocoonUsePipe => "--cocoon-usepipe",
            Self::ChrysalisDir => "--chrysalis-dir",
            Self::LarvaStartup => "--larva-startup",
        }
    }
}

/// Requested overrides. `None` and empty strings are both "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MorphOverrides {
    /// New wrapper preparation script.
    pub cocoon_startup: Option<String>,
    /// New log level (`info`, `warning`, `error`).
    pub cocoon_loglevel: Option<String>,
    /// New capture file prefix.
    pub cocoon_logname: Option<String>,
    /// Enable or disable the rendezvous channel.
    pub cocoon_usepipe: Option<String>,
    /// Runtime version to activate.
    pub chrysalis_dir: Option<String>,
    /// New application startup script.
    pub larva_startup: Option<String>,
}

impl MorphOverrides {
    /// Value requested for `field`, if any and non-empty.
    #[must_use]
    pub fn get(&self, field: OverrideField) -> Option<&str> {
        let value = match field {
            OverrideField::CocoonStartup => &self.cocoon_startup,
            OverrideField::CocoonLogLevel => &self.cocoon_loglevel,
            OverrideField::CocoonLogName => &self.cocoon_logname,
            OverrideField::CocoonUsePipe => &self.cocoon_usepipe,
            OverrideField::ChrysalisDir => &self.chrysalis_dir,
            OverrideField::LarvaStartup => &self.larva_startup,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }

    /// Whether no override would apply.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        OverrideField::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

/// Apply every non-empty override. Returns whether anything changed.
pub fn morph(overrides: &MorphOverrides, settings: &mut Settings, paths: &CocoonPaths) -> bool {
    let mut changed = false;
    for field in OverrideField::ALL {
        let Some(value) = overrides.get(field) else {
            continue;
        };
        if field == OverrideField::ChrysalisDir {
            apply_runtime_version(value, settings, paths);
        } else {
            settings.set(field.section(), field.key(), value);
            log_applied(field.section(), field.key(), value);
        }
        changed = true;
    }
    changed
}

/// Activate runtime `version`, pulling architecture directories and init
/// script from its `chrysalis.toml` when one is present.
///
/// Returns `false` only for an empty version.
pub fn apply_runtime_version(version: &str, settings: &mut Settings, paths: &CocoonPaths) -> bool {
    if version.is_empty() {
        return false;
    }

    let version_dir = runtime_base_dir(settings, paths).join(version);
    cascade_descriptor(&version_dir, settings);

    settings.set(keys::CHRYSALIS, keys::DIR_VERSION, version);
    log_applied(keys::CHRYSALIS, keys::DIR_VERSION, version);
    true
}

fn cascade_descriptor(version_dir: &Path, settings: &mut Settings) {
    let path = version_dir.join(keys::VERSION_DESCRIPTOR_FILE);
    if !path.is_file() {
        debug!(path = %path.display(), "no version descriptor");
        return;
    }

    let descriptor = match Settings::load(&path) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable version descriptor");
            return;
        },
    };

    for key in [keys::DIR_64BIT, keys::DIR_32BIT, keys::INIT_SCRIPT] {
        if let Some(value) = descriptor.get(keys::ROOT, key) {
            settings.set(keys::CHRYSALIS, key, value.clone());
            log_applied(keys::CHRYSALIS, key, &value);
        }
    }
}

fn log_applied(section: &str, key: &str, value: &str) {
    warn!(section, key, value, "applied metamorphosis");
}
