//! Environment handed to the startup script chain.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;

use cocoon_config::BundleDescriptor;
use cocoon_rendezvous::ChannelName;
use tokio::process::Command;

/// Prefix reserved for variables the wrapper exports.
pub const ENV_PREFIX: &str = "COCOON_";

/// Wrapper process id.
pub const COCOON_PID: &str = "COCOON_PID";
/// Host word size (`64bit` / `32bit`).
pub const COCOON_ARCH: &str = "COCOON_ARCH";
/// Wrapper directory.
pub const COCOON_PATH: &str = "COCOON_PATH";
/// Runtime directory, empty when the bundle has no runtime.
pub const COCOON_RUNTIME: &str = "COCOON_RUNTIME";
/// Application directory.
pub const COCOON_APPDIR: &str = "COCOON_APPDIR";
/// Wrapper arguments plus the rendezvous markers, space separated.
pub const COCOON_ARGUMENTS: &str = "COCOON_ARGUMENTS";
/// Wrapper executable.
pub const COCOON_EXE: &str = "COCOON_EXE";
/// Rendezvous channel name, only set while the channel listens.
pub const COCOON_NPIPE: &str = "COCOON_NPIPE";

/// Argument marker carrying the wrapper pid.
pub const PID_MARKER: &str = "--cocoon-pid=";
/// Argument marker carrying the rendezvous channel name.
pub const NPIPE_MARKER: &str = "--cocoon-npipe=";

/// Full environment of the child, built once before spawning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEnvironment {
    vars: BTreeMap<OsString, OsString>,
    arguments: Vec<String>,
}

impl ChildEnvironment {
    /// Build from the current process environment.
    #[must_use]
    pub fn build(
        bundle: &BundleDescriptor,
        exe: &Path,
        pid: u32,
        args: &[String],
        channel: Option<&ChannelName>,
    ) -> Self {
        Self::from_parts(std::env::vars_os(), bundle, exe, pid, args, channel)
    }

    /// Build from an explicit inherited environment.
    ///
    /// Every inherited `COCOON_*` variable is dropped so a nested wrapper
    /// never leaks its values into this child.
    pub fn from_parts<I>(
        inherited: I,
        bundle: &BundleDescriptor,
        exe: &Path,
        pid: u32,
        args: &[String],
        channel: Option<&ChannelName>,
    ) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut vars: BTreeMap<OsString, OsString> = inherited
            .into_iter()
            .filter(|(key, _)| !is_reserved(key))
            .collect();

        let arguments = child_arguments(args, pid, channel);
        let runtime = bundle
            .runtime_path
            .as_deref()
            .map(|p| p.as_os_str().to_owned())
            .unwrap_or_default();

        let mut set = |key: &str, value: OsString| {
            vars.insert(OsString::from(key), value);
        };
        set(COCOON_PID, pid.to_string().into());
        set(COCOON_ARCH, bundle.architecture.label().into());
        set(COCOON_PATH, bundle.cocoon_path.as_os_str().to_owned());
        set(COCOON_RUNTIME, runtime);
        set(COCOON_APPDIR, bundle.app_path.as_os_str().to_owned());
        set(COCOON_ARGUMENTS, join_arguments(&arguments).into());
        set(COCOON_EXE, exe.as_os_str().to_owned());
        if let Some(name) = channel {
            set(COCOON_NPIPE, name.as_str().into());
        }

        Self { vars, arguments }
    }

    /// All variables, sorted by name.
    #[must_use]
    pub fn vars(&self) -> &BTreeMap<OsString, OsString> {
        &self.vars
    }

    /// Value of `key`, if set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(&OsString::from(key)).and_then(|v| v.to_str())
    }

    /// Argument tokens exported through `COCOON_ARGUMENTS`.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Replace the environment of `cmd` with this one.
    pub fn apply(&self, cmd: &mut Command) {
        cmd.env_clear();
        cmd.envs(&self.vars);
    }
}

fn is_reserved(key: &OsString) -> bool {
    let Some(key) = key.to_str() else {
        return false;
    };
    if cfg!(windows) {
        key.len() >= ENV_PREFIX.len()
            && key
                .get(..ENV_PREFIX.len())
                .is_some_and(|p| p.eq_ignore_ascii_case(ENV_PREFIX))
    } else {
        key.starts_with(ENV_PREFIX)
    }
}

/// Wrapper arguments followed by the rendezvous markers.
#[must_use]
pub fn child_arguments(args: &[String], pid: u32, channel: Option<&ChannelName>) -> Vec<String> {
    let mut out = args.to_vec();
    out.push(format!("{PID_MARKER}{pid}"));
    if let Some(name) = channel {
        out.push(format!("{NPIPE_MARKER}{name}"));
    }
    out
}

/// Join tokens with spaces, double-quoting those containing whitespace.
#[must_use]
pub fn join_arguments(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| {
            if t.chars().any(char::is_whitespace) {
                format!("\"{t}\"")
            } else {
                t.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
