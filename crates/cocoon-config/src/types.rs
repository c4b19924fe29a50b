//! Small value types shared by the resolver and the command surface.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::keys;

/// Extension of the shell scripts the platform interpreter runs.
#[cfg(windows)]
pub const SCRIPT_EXTENSION: &str = "cmd";
/// Extension of the shell scripts the platform interpreter runs.
#[cfg(not(windows))]
pub const SCRIPT_EXTENSION: &str = "sh";

/// CPU word size of the host. Detected, never configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    /// 32-bit host.
    Bits32,
    /// 64-bit host.
    Bits64,
}

impl Architecture {
    /// Detect the word size of the running host.
    #[must_use]
    pub fn detect() -> Self {
        match std::env::consts::ARCH {
            "x86_64" | "aarch64" | "powerpc64" | "riscv64" | "s390x" | "loongarch64"
            | "mips64" | "sparc64" => Self::Bits64,
            "x86" | "arm" | "mips" | "powerpc" | "riscv32" => Self::Bits32,
            _ if cfg!(target_pointer_width = "64") => Self::Bits64,
            _ => Self::Bits32,
        }
    }

    /// Label exported to the child (`64bit` / `32bit`), also the default
    /// architecture subdirectory name.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Bits32 => "32bit",
            Self::Bits64 => "64bit",
        }
    }

    /// Settings key holding the architecture subdirectory name.
    #[must_use]
    pub fn dir_key(self) -> &'static str {
        match self {
            Self::Bits32 => keys::DIR_32BIT,
            Self::Bits64 => keys::DIR_64BIT,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Wrapper log verbosity as persisted in `cocoon.log.level`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum LogLevel {
    /// Everything, including the resolved bundle dump.
    Info,
    /// Configuration changes and recoverable problems.
    Warning,
    /// Failures only.
    #[default]
    Error,
}

impl LogLevel {
    /// Parse a persisted value; anything unrecognized falls back to `error`.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    /// Persisted spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Equivalent `tracing` filter directive.
    #[must_use]
    pub fn filter_directive(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(ConfigError::ValidationError {
                field: keys::LOG_LEVEL.to_owned(),
                message: format!("unknown log level '{other}'; expected info, warning or error"),
            }),
        }
    }
}

/// Yes/no switch as accepted on the command line (`yes`, `no`, `true`, `false`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Toggle {
    /// Enabled.
    Yes,
    /// Disabled.
    No,
    /// Enabled.
    True,
    /// Disabled.
    False,
}

impl Toggle {
    /// Whether the switch is on.
    #[must_use]
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Yes | Self::True)
    }

    /// Spelling written to the settings file.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::True => "true",
            Self::False => "false",
        }
    }
}

/// Interpret a persisted switch value. Only `yes` and `true` (any case) enable.
#[must_use]
pub fn is_enabled(value: &str) -> bool {
    value.eq_ignore_ascii_case("yes") || value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_lenient_falls_back_to_error() {
        assert_eq!(LogLevel::parse_lenient("info"), LogLevel::Info);
        assert_eq!(LogLevel::parse_lenient("warning"), LogLevel::Warning);
        assert_eq!(LogLevel::parse_lenient("verbose"), LogLevel::Error);
        assert_eq!(LogLevel::parse_lenient(""), LogLevel::Error);
    }

    #[test]
    fn test_log_level_filter_directive() {
        assert_eq!(LogLevel::Warning.filter_directive(), "warn");
        assert_eq!(LogLevel::Error.filter_directive(), "error");
    }

    #[test]
    fn test_is_enabled() {
        assert!(is_enabled("yes"));
        assert!(is_enabled("TRUE"));
        assert!(!is_enabled("no"));
        assert!(!is_enabled("1"));
        assert!(!is_enabled(""));
    }

    #[test]
    fn test_toggle() {
        assert!(Toggle::Yes.is_enabled());
        assert!(Toggle::True.is_enabled());
        assert!(!Toggle::False.is_enabled());
        assert_eq!(Toggle::No.as_str(), "no");
    }

    #[test]
    fn test_architecture_labels() {
        assert_eq!(Architecture::Bits64.label(), "64bit");
        assert_eq!(Architecture::Bits32.dir_key(), "dir.32bit");
        let detected = Architecture::detect();
        if cfg!(target_pointer_width = "64") {
            assert_eq!(detected, Architecture::Bits64);
        }
    }
}
