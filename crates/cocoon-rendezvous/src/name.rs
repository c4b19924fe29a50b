//! Channel naming.

use std::fmt;

/// Prefix shared by every channel name.
const NAME_PREFIX: &str = "cocoon_";

/// Platform address of a rendezvous channel.
///
/// A Unix domain socket path on Unix, a named pipe path on Windows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelName(String);

impl ChannelName {
    /// Name derived from a supervisor pid.
    #[cfg(unix)]
    #[must_use]
    pub fn for_pid(pid: u32) -> Self {
        let path = std::env::temp_dir().join(format!("{NAME_PREFIX}{pid}.sock"));
        Self(path.display().to_string())
    }

    /// Name derived from a supervisor pid.
    #[cfg(windows)]
    #[must_use]
    pub fn for_pid(pid: u32) -> Self {
        Self(format!(r"\\.\pipe\{NAME_PREFIX}{pid}"))
    }

    /// Name owned by the running process.
    #[must_use]
    pub fn current() -> Self {
        Self::for_pid(std::process::id())
    }

    /// Use an explicit address, e.g. one read from `COCOON_NPIPE`.
    pub fn from_raw(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The address as handed to the child.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_pid_embeds_pid() {
        let name = ChannelName::for_pid(4242);
        assert!(name.as_str().contains("cocoon_4242"));
        #[cfg(unix)]
        assert!(name.as_str().ends_with(".sock"));
        #[cfg(windows)]
        assert_eq!(name.as_str(), r"\\.\pipe\cocoon_4242");
    }

    #[test]
    fn test_current_matches_process() {
        assert_eq!(ChannelName::current(), ChannelName::for_pid(std::process::id()));
    }
}
