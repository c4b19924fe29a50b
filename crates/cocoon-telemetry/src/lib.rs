//! Cocoon Telemetry - logging for the Cocoon launcher.
//!
//! This crate provides:
//! - A `tracing` subscriber whose level can be changed after startup
//! - A deferred sink that holds records until the capture file is open
//!
//! # Example
//!
//! ```rust,no_run
//! use cocoon_telemetry::{LogConfig, setup_logging};
//!
//! # fn main() -> Result<(), cocoon_telemetry::TelemetryError> {
//! let handle = setup_logging(&LogConfig::new("error"))?;
//! tracing::info!("not shown yet");
//!
//! // Configuration has been read.
//! handle.set_level("info")?;
//! handle.attach(std::io::stderr())?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;
mod sink;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LoggingHandle, build_subscriber, setup_logging};
pub use sink::{DEFAULT_BUFFER_CAPACITY, DeferredSink, RecordWriter};
