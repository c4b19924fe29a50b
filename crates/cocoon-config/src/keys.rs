//! Section and key names of the persisted configuration.
//!
//! Dotted key names (`log.level`, `dir.64bit`) are single keys, not nested
//! tables; they are written quoted in the TOML file.

/// Wrapper section.
pub const COCOON: &str = "cocoon";
/// Embedded runtime section.
pub const CHRYSALIS: &str = "chrysalis";
/// Application section.
pub const LARVA: &str = "larva";
/// Bookkeeping written by metamorphosis commands.
pub const METAMORPHOSIS: &str = "metamorphosis";
/// Root-level keys (used by version descriptor files).
pub const ROOT: &str = "";

/// `cocoon.startup`
pub const STARTUP: &str = "startup";
/// `cocoon.log.file`
pub const LOG_FILE: &str = "log.file";
/// `cocoon.log.level`
pub const LOG_LEVEL: &str = "log.level";
/// `cocoon.log.dir`
pub const LOG_DIR: &str = "log.dir";
/// `cocoon.usepipe`
pub const USE_PIPE: &str = "usepipe";

/// `chrysalis.dir.base`
pub const DIR_BASE: &str = "dir.base";
/// `chrysalis.dir.version`
pub const DIR_VERSION: &str = "dir.version";
/// `chrysalis.dir.64bit`
pub const DIR_64BIT: &str = "dir.64bit";
/// `chrysalis.dir.32bit`
pub const DIR_32BIT: &str = "dir.32bit";
/// `chrysalis.initscript`
pub const INIT_SCRIPT: &str = "initscript";

/// `larva.appdir`
pub const APP_DIR: &str = "appdir";

/// `metamorphosis.date`
pub const DATE: &str = "date";

/// File name of the self-describing runtime descriptor inside a version directory.
pub const VERSION_DESCRIPTOR_FILE: &str = "chrysalis.toml";
