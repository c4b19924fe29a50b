//! Chaining of the wrapper, runtime and application startup scripts.
//!
//! One interpreter invocation drives the chain, but every script runs as its
//! own command: an `exit` inside one script ends only that script, and an
//! executable script keeps its own interpreter line. The chain short-circuits
//! on the first failing script and its status becomes the chain's status.
//! Scripts share only the environment built by the supervisor.

use std::path::{Path, PathBuf};

use cocoon_config::BundleDescriptor;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{SupervisorError, SupervisorResult};

/// Separator between chained scripts.
pub const CHAIN_SEPARATOR: &str = " && ";

/// Windows process creation flag suppressing the console window.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Ordered startup scripts of one launch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptChain {
    scripts: Vec<PathBuf>,
}

impl ScriptChain {
    /// Empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrapper, runtime and application scripts of `bundle`, in that order.
    ///
    /// The first two are skipped when absent; the application script is
    /// always included.
    #[must_use]
    pub fn from_bundle(bundle: &BundleDescriptor) -> Self {
        let mut chain = Self::new();
        if let Some(script) = &bundle.cocoon_startup_script {
            chain.push_optional(script);
        }
        if let Some(script) = &bundle.runtime_startup_script {
            chain.push_optional(script);
        }
        chain.push_required(&bundle.app_startup_script);
        chain
    }

    /// Append `script` if it exists on disk.
    pub fn push_optional(&mut self, script: &Path) -> bool {
        if script.is_file() {
            self.scripts.push(script.to_path_buf());
            true
        } else {
            debug!(script = %script.display(), "skipping missing optional script");
            false
        }
    }

    /// Append `script` unconditionally.
    pub fn push_required(&mut self, script: &Path) {
        self.scripts.push(script.to_path_buf());
    }

    /// Scripts in execution order.
    #[must_use]
    pub fn scripts(&self) -> &[PathBuf] {
        &self.scripts
    }

    /// Whether there is nothing to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// The chained invocation passed to the interpreter.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.scripts
            .iter()
            .map(|s| invocation(s))
            .collect::<Vec<_>>()
            .join(CHAIN_SEPARATOR)
    }

    /// Interpreter command running the whole chain.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::EmptyChain`] when there are no scripts.
    pub fn to_command(&self) -> SupervisorResult<Command> {
        if self.is_empty() {
            return Err(SupervisorError::EmptyChain);
        }
        let line = self.command_line();
        info!(chain = %line, "startup chain");
        Ok(interpreter_command(&line))
    }
}

/// Program used to run the chain.
#[must_use]
pub fn interpreter() -> String {
    #[cfg(windows)]
    {
        std::env::var("COMSPEC")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "cmd.exe".to_owned())
    }
    #[cfg(not(windows))]
    {
        "sh".to_owned()
    }
}

#[cfg(windows)]
fn invocation(script: &Path) -> String {
    format!("\"{}\"", script.display())
}

/// Executable scripts run directly so their `#!` line applies; others are
/// handed to `sh`.
#[cfg(not(windows))]
fn invocation(script: &Path) -> String {
    let quoted = shell_quote(&script.display().to_string());
    if is_executable(script) {
        quoted
    } else {
        format!("sh {quoted}")
    }
}

#[cfg(not(windows))]
fn is_executable(script: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    /// Any of the owner, group or other execute bits.
    const EXECUTE_BITS: u32 = 0o111;

    std::fs::metadata(script)
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & EXECUTE_BITS != 0)
}

/// Single-quote `value` for a POSIX shell.
#[cfg(not(windows))]
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(windows)]
fn interpreter_command(line: &str) -> Command {
    let mut cmd = Command::new(interpreter());
    cmd.raw_arg(format!("/C \"{line}\""));
    cmd.creation_flags(CREATE_NO_WINDOW);
    cmd
}

#[cfg(not(windows))]
fn interpreter_command(line: &str) -> Command {
    let mut cmd = Command::new(interpreter());
    cmd.arg("-c").arg(line);
    cmd
}
