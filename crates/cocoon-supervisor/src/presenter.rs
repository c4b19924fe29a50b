//! Operator-facing output: fatal reports and messages relayed from the child.

use std::io::IsTerminal;
use std::sync::Arc;

use cocoon_rendezvous::MessageHandler;
use colored::Colorize;
use tracing::{error, info};

/// Title used for `messagebox:` lines sent by the child.
pub const CHILD_MESSAGE_TITLE: &str = "Cocoon message";

/// How the wrapper talks to a human.
pub trait Presenter: Send + Sync {
    /// Report an error that ends the wrapper.
    fn report_fatal(&self, message: &str);

    /// Show an informational message.
    fn show_message(&self, title: &str, text: &str);
}

/// Presenter writing highlighted blocks to the controlling terminal.
///
/// Everything shown is also logged, so messages survive when no terminal
/// is attached.
#[derive(Debug, Clone)]
pub struct ConsolePresenter {
    console: bool,
}

impl ConsolePresenter {
    /// Presenter for the current process.
    #[must_use]
    pub fn new() -> Self {
        Self {
            console: attach_console(),
        }
    }

    /// Whether output reaches a terminal.
    #[must_use]
    pub fn has_console(&self) -> bool {
        self.console
    }
}

impl Default for ConsolePresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Presenter for ConsolePresenter {
    fn report_fatal(&self, message: &str) {
        error!(message, "fatal");
        if self.console {
            eprintln!("{} {}", "✗".red(), message.red());
        }
    }

    fn show_message(&self, title: &str, text: &str) {
        info!(title, text, "message");
        if self.console {
            eprintln!("{} {}", title.bold().cyan(), text);
        }
    }
}

/// Whether the wrapper's diagnostics can reach an operator's terminal.
///
/// Detection only: the wrapper never allocates a console of its own.
#[must_use]
pub fn attach_console() -> bool {
    std::io::stderr().is_terminal()
}

/// Relays `messagebox:` lines from the rendezvous channel to a presenter.
pub struct PresenterHandler {
    presenter: Arc<dyn Presenter>,
}

impl PresenterHandler {
    /// Wrap a presenter.
    #[must_use]
    pub fn new(presenter: Arc<dyn Presenter>) -> Self {
        Self { presenter }
    }
}

impl MessageHandler for PresenterHandler {
    fn message_box(&self, text: &str) {
        self.presenter.show_message(CHILD_MESSAGE_TITLE, text);
    }
}
