//! Rendezvous channel error types.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by the rendezvous channel.
#[derive(Debug, Error)]
pub enum RendezvousError {
    /// I/O failure on the underlying socket or pipe.
    #[error("I/O error on rendezvous channel: {0}")]
    Io(#[from] io::Error),

    /// A line did not have the `key:value` shape.
    #[error("Malformed rendezvous line: {line:?}")]
    MalformedLine {
        /// Offending line, without its terminator.
        line: String,
    },

    /// A line exceeded the accepted length.
    #[error("Rendezvous line exceeds {limit} bytes")]
    LineTooLong {
        /// Maximum accepted line length.
        limit: usize,
    },

    /// A message key cannot be represented on the wire.
    #[error("Invalid rendezvous key '{key}': keys must be non-empty and contain no ':' or line breaks")]
    InvalidKey {
        /// Rejected key.
        key: String,
    },

    /// The channel already has an active listener.
    #[error("Rendezvous channel {name} is already listening")]
    AlreadyListening {
        /// Channel name.
        name: String,
    },

    /// Nobody connected during the notify accept window.
    #[error("No peer connected to {name} within {window:?}")]
    NotifyTimeout {
        /// Channel name.
        name: String,
        /// Accept window that elapsed.
        window: Duration,
    },

    /// A client could not reach the channel in time.
    #[error("Could not connect to {name} within {timeout:?}")]
    ConnectTimeout {
        /// Channel name.
        name: String,
        /// Connect deadline that elapsed.
        timeout: Duration,
    },

    /// The peer closed the connection before sending a full line.
    #[error("Rendezvous peer closed the connection before a message arrived")]
    ConnectionClosed,
}

/// Result type for rendezvous operations.
pub type RendezvousResult<T> = Result<T, RendezvousError>;
