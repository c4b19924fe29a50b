//! Process exit codes.

use std::process::ExitCode;

/// How the wrapper finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Launch completed, or a metamorphosis was applied and saved.
    Success,
    /// Configuration invalid or the child could not be launched.
    Fatal,
    /// A metamorphosis command ran but changed nothing.
    Unchanged,
    /// A metamorphosis command could not run (bad arguments, unreadable or
    /// unwritable configuration).
    Failed,
}

impl Outcome {
    /// Numeric exit status.
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Fatal => 1,
            Self::Unchanged => 2,
            Self::Failed => 3,
        }
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        ExitCode::from(outcome.code())
    }
}
