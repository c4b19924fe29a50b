//! Lifecycle of one supervised launch.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use cocoon_config::{BundleDescriptor, ValidatedBundle};
use cocoon_rendezvous::{ChannelName, Rendezvous, RendezvousMessage};
use cocoon_telemetry::LoggingHandle;
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::capture::{CaptureFiles, OutputCapture};
use crate::chain::ScriptChain;
use crate::env::ChildEnvironment;
use crate::error::{SupervisorError, SupervisorResult};
use crate::presenter::{Presenter, PresenterHandler, attach_console};

/// Where a launch is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Nothing done yet.
    Idle,
    /// Capture files are open, the child is not started.
    Preparing,
    /// The child is running.
    Running,
    /// The child exited on its own.
    Exited {
        /// Exit code, `None` when ended by a signal.
        code: Option<i32>,
    },
    /// The child was stopped by the wrapper.
    Killed,
}

impl SupervisorState {
    /// Whether the child has finished one way or another.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Exited { .. } | Self::Killed)
    }
}

/// Owns the child process, its capture files and the rendezvous channel.
pub struct Supervisor {
    bundle: ValidatedBundle,
    exe: PathBuf,
    args: Vec<String>,
    presenter: Arc<dyn Presenter>,
    logging: Option<LoggingHandle>,
    channel_name: Option<ChannelName>,
    notify_window: Option<Duration>,
    state: SupervisorState,
    capture: Option<CaptureFiles>,
    channel: Option<Rendezvous>,
    child: Option<Child>,
}

impl Supervisor {
    /// Supervisor for `bundle`, launched on behalf of the wrapper at `exe`.
    #[must_use]
    pub fn new(bundle: ValidatedBundle, exe: impl Into<PathBuf>, presenter: Arc<dyn Presenter>) -> Self {
        Self {
            bundle,
            exe: exe.into(),
            args: Vec::new(),
            presenter,
            logging: None,
            channel_name: None,
            notify_window: None,
            state: SupervisorState::Idle,
            capture: None,
            channel: None,
            child: None,
        }
    }

    /// Wrapper arguments forwarded through `COCOON_ARGUMENTS`.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Route wrapper diagnostics into the stderr capture once it is open.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingHandle) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Use `name` instead of the pid-derived channel name.
    #[must_use]
    pub fn with_channel_name(mut self, name: ChannelName) -> Self {
        self.channel_name = Some(name);
        self
    }

    /// How long `stop` waits for the child to pick up `event:die`.
    #[must_use]
    pub fn with_notify_window(mut self, window: Duration) -> Self {
        self.notify_window = Some(window);
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Bundle being launched.
    #[must_use]
    pub fn bundle(&self) -> &BundleDescriptor {
        &self.bundle
    }

    /// Open capture files, once [`Self::prepare`] ran.
    #[must_use]
    pub fn capture(&self) -> Option<&CaptureFiles> {
        self.capture.as_ref()
    }

    /// Rendezvous channel, when one was opened.
    #[must_use]
    pub fn channel(&self) -> Option<&Rendezvous> {
        self.channel.as_ref()
    }

    /// Pid of the running child.
    #[must_use]
    pub fn child_id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Open the capture files and redirect wrapper diagnostics into them.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Capture`] when the files cannot be opened.
    pub fn prepare(&mut self) -> SupervisorResult<()> {
        self.expect_state("prepare", |s| s == SupervisorState::Idle)?;

        let console = attach_console();
        debug!(console, "console detection");

        let capture = OutputCapture::new(self.bundle.output_path(), self.bundle.log_name.clone());
        let files = capture.open()?;

        if let Some(logging) = &self.logging {
            let writer = files.diagnostics()?;
            if let Err(e) = logging.attach(writer) {
                warn!(error = %e, "wrapper diagnostics stay in memory");
            }
        }
        info!(
            stdout = %files.stdout_path().display(),
            stderr = %files.stderr_path().display(),
            "output capture ready"
        );

        self.capture = Some(files);
        self.state = SupervisorState::Preparing;
        Ok(())
    }

    /// Start listening on the rendezvous channel when the bundle asks for it.
    ///
    /// Failing to bind is not fatal: the child is launched without a channel.
    /// Returns whether the channel is listening.
    pub fn open_channel(&mut self) -> bool {
        if !self.bundle.use_pipe {
            return false;
        }
        if self.channel.as_ref().is_some_and(Rendezvous::is_listening) {
            return true;
        }

        let name = self
            .channel_name
            .clone()
            .unwrap_or_else(ChannelName::current);
        let mut channel = Rendezvous::new(name);
        if let Some(window) = self.notify_window {
            channel = channel.with_notify_window(window);
        }

        let handler = Arc::new(PresenterHandler::new(Arc::clone(&self.presenter)));
        match channel.listen(handler) {
            Ok(()) => {
                self.channel = Some(channel);
                true
            },
            Err(e) => {
                warn!(channel = %channel.name(), error = %e, "launching without rendezvous channel");
                false
            },
        }
    }

    /// Spawn the startup chain.
    ///
    /// Prepares first when [`Self::prepare`] was not called.
    ///
    /// # Errors
    ///
    /// Returns an error when capture cannot be opened, the chain is empty or
    /// the interpreter fails to start.
    pub fn start(&mut self) -> SupervisorResult<u32> {
        if self.state == SupervisorState::Idle {
            self.prepare()?;
        }
        self.expect_state("start", |s| s == SupervisorState::Preparing)?;

        let capture = self.capture.as_ref().ok_or(SupervisorError::InvalidState {
            operation: "start",
            state: self.state,
        })?;
        let (stdout, stderr) = capture.child_stdio()?;

        let channel_name = self
            .channel
            .as_ref()
            .filter(|c| c.is_listening())
            .map(Rendezvous::name);
        let env = ChildEnvironment::build(
            &self.bundle,
            &self.exe,
            std::process::id(),
            &self.args,
            channel_name,
        );

        let chain = ScriptChain::from_bundle(&self.bundle);
        let mut cmd = chain.to_command()?;
        env.apply(&mut cmd);
        cmd.current_dir(&self.bundle.app_path)
            .stdin(Stdio::inherit())
            .stdout(stdout)
            .stderr(stderr);

        let child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            program: crate::chain::interpreter(),
            source,
        })?;
        let pid = child.id().unwrap_or_default();
        info!(pid, app_dir = %self.bundle.app_path.display(), "child started");

        self.child = Some(child);
        self.state = SupervisorState::Running;
        Ok(pid)
    }

    /// Wait for the child to exit. No timeout.
    ///
    /// Cancel-safe: dropping the future leaves the child tracked, so
    /// [`Self::stop`] can still reach it.
    ///
    /// # Errors
    ///
    /// Returns an error when no child was started or waiting fails.
    pub async fn wait(&mut self) -> SupervisorResult<Option<i32>> {
        match self.state {
            SupervisorState::Exited { code } => return Ok(code),
            SupervisorState::Killed => return Ok(None),
            _ => {},
        }
        let Some(child) = self.child.as_mut() else {
            return Err(SupervisorError::InvalidState {
                operation: "wait",
                state: self.state,
            });
        };

        let status = child.wait().await.map_err(SupervisorError::Child)?;
        let code = status.code();
        self.child = None;
        self.state = SupervisorState::Exited { code };
        if let Some(capture) = &self.capture {
            capture.sync();
        }

        if status.success() {
            info!("child exited");
        } else {
            warn!(code, "child exited with failure");
        }
        Ok(code)
    }

    /// Ask the child to quit over the channel, then kill it.
    ///
    /// A no-op when no child is tracked, so calling it twice is safe.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Child`] when the kill fails.
    pub async fn stop(&mut self) -> SupervisorResult<()> {
        let Some(mut child) = self.child.take() else {
            debug!(state = ?self.state, "stop: no child tracked");
            return Ok(());
        };

        if let Some(channel) = self.channel.as_mut() {
            // Best effort: the kill below happens regardless.
            let _ = channel.notify(&RendezvousMessage::die()).await;
        }

        match child.try_wait() {
            Ok(Some(status)) => {
                info!(code = status.code(), "child already exited");
                self.state = SupervisorState::Exited {
                    code: status.code(),
                };
                return Ok(());
            },
            Ok(None) => {},
            Err(e) => warn!(error = %e, "could not poll child"),
        }

        if let Err(e) = child.start_kill() {
            // Reaped between the poll and the kill.
            if child.try_wait().ok().flatten().is_none() {
                self.child = Some(child);
                return Err(SupervisorError::Child(e));
            }
        }
        let _ = child.wait().await;

        info!("child killed");
        self.state = SupervisorState::Killed;
        Ok(())
    }

    /// Shut the rendezvous channel down, if open.
    pub async fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close().await;
        }
    }

    /// Report a fatal error through the presenter.
    pub fn report_fatal(&self, error: &SupervisorError) {
        self.presenter.report_fatal(&error.to_string());
    }

    /// Capture directory in use, if prepared.
    #[must_use]
    pub fn capture_dir(&self) -> Option<&Path> {
        self.capture
            .as_ref()
            .and_then(|c| c.stdout_path().parent())
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: impl Fn(SupervisorState) -> bool,
    ) -> SupervisorResult<()> {
        if allowed(self.state) {
            Ok(())
        } else {
            Err(SupervisorError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("state", &self.state)
            .field("exe", &self.exe)
            .field("child", &self.child_id())
            .finish_non_exhaustive()
    }
}
