//! Supervisor error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::supervisor::SupervisorState;

/// Errors raised while preparing, launching or stopping the child.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A capture file could not be opened, rotated or cloned.
    #[error("Cannot open output capture {}: {source}", .path.display())]
    Capture {
        /// Capture file involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The interpreter running the script chain could not be started.
    #[error("Failed to start {program}: {source}")]
    Spawn {
        /// Interpreter that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Waiting on or killing the child failed.
    #[error("Child process error: {0}")]
    Child(#[source] io::Error),

    /// The script chain has nothing to run.
    #[error("No startup script to run")]
    EmptyChain,

    /// An operation was called in the wrong lifecycle state.
    #[error("Cannot {operation} while {state:?}")]
    InvalidState {
        /// Operation attempted.
        operation: &'static str,
        /// State at the time.
        state: SupervisorState,
    },

    /// The rendezvous channel failed.
    #[error(transparent)]
    Rendezvous(#[from] cocoon_rendezvous::RendezvousError),
}

/// Result type for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;
