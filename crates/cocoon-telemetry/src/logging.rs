//! Logging configuration and setup.

use std::io::Write;

use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt,
    layer::{Layered, SubscriberExt},
    reload,
    util::SubscriberInitExt,
};

use crate::error::{TelemetryError, TelemetryResult};
use crate::sink::{DEFAULT_BUFFER_CAPACITY, DeferredSink};

/// Registry with the reloadable level filter applied.
type FilteredRegistry = Layered<reload::Layer<EnvFilter, Registry>, Registry>;

/// Helper to convert init errors to our error type.
fn init_err<E: std::fmt::Display>(e: E) -> TelemetryError {
    TelemetryError::InitError(e.to_string())
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level filter (e.g., "info", "warn", "error").
    pub level: String,
    /// Whether to include timestamps.
    pub timestamps: bool,
    /// Whether to use ANSI colors.
    pub ansi: bool,
    /// Records held in memory until a sink is attached.
    pub buffer_capacity: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "error".to_string(),
            timestamps: true,
            ansi: false,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl LogConfig {
    /// Create a new log config with the specified level.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// Disable timestamps.
    #[must_use]
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    fn build_format_layer(
        &self,
        sink: DeferredSink,
    ) -> Box<dyn Layer<FilteredRegistry> + Send + Sync + 'static> {
        let base = fmt::layer().with_writer(sink).with_ansi(self.ansi).compact();

        if self.timestamps {
            base.boxed()
        } else {
            base.without_time().boxed()
        }
    }
}

fn build_filter(level: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(level).map_err(|e| TelemetryError::ConfigError(e.to_string()))
}

/// Control over a logging pipeline after it was installed.
#[derive(Clone)]
pub struct LoggingHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    sink: DeferredSink,
}

impl LoggingHandle {
    /// Replace the level filter.
    ///
    /// # Errors
    ///
    /// Returns an error if `level` is not a valid filter or the subscriber is gone.
    pub fn set_level(&self, level: &str) -> TelemetryResult<()> {
        let filter = build_filter(level)?;
        self.filter
            .reload(filter)
            .map_err(|e| TelemetryError::ReloadError(e.to_string()))
    }

    /// Send all records, including those buffered so far, to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffered records cannot be replayed.
    pub fn attach<W>(&self, writer: W) -> TelemetryResult<()>
    where
        W: Write + Send + 'static,
    {
        self.sink.attach(writer)?;
        Ok(())
    }

    /// The sink all formatted records go through.
    #[must_use]
    pub fn sink(&self) -> &DeferredSink {
        &self.sink
    }
}

impl std::fmt::Debug for LoggingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingHandle")
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}

/// Build a subscriber without installing it.
///
/// Useful for scoping a pipeline with [`tracing::subscriber::with_default`].
///
/// # Errors
///
/// Returns an error if the configured level is invalid.
pub fn build_subscriber(
    config: &LogConfig,
) -> TelemetryResult<(impl Subscriber + Send + Sync + 'static, LoggingHandle)> {
    let filter = build_filter(&config.level)?;
    let (filter_layer, filter_handle) = reload::Layer::new(filter);
    let sink = DeferredSink::new(config.buffer_capacity);

    let subscriber = tracing_subscriber::registry()
        .with(filter_layer)
        .with(config.build_format_layer(sink.clone()));

    let handle = LoggingHandle {
        filter: filter_handle,
        sink,
    };
    Ok((subscriber, handle))
}

/// Install the global subscriber.
///
/// Records are buffered in memory until [`LoggingHandle::attach`] is called.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or a global subscriber
/// is already installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<LoggingHandle> {
    let (subscriber, handle) = build_subscriber(config)?;
    subscriber.try_init().map_err(init_err)?;
    Ok(handle)
}
