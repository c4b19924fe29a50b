//! Default mode: resolve the bundle, launch it and supervise it to the end.

use std::sync::Arc;

use cocoon_config::{Architecture, BundleDescriptor, CocoonPaths, SCRIPT_EXTENSION, loader};
use cocoon_supervisor::{ConsolePresenter, Presenter, Supervisor};
use cocoon_telemetry::{LogConfig, LoggingHandle, setup_logging};
use tracing::{error, info, warn};

use crate::exit::Outcome;

/// Launch the bundle next to the wrapper and wait for it.
pub(crate) async fn run(args: Vec<String>, paths: CocoonPaths) -> Outcome {
    let logging = match setup_logging(&LogConfig::default()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        },
    };
    let presenter: Arc<dyn Presenter> = Arc::new(ConsolePresenter::new());

    let descriptor = match resolve(&paths) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            fatal(presenter.as_ref(), logging.as_ref(), &format!("{e:#}"));
            return Outcome::Fatal;
        },
    };

    if let Some(handle) = &logging
        && let Err(e) = handle.set_level(descriptor.log_level.filter_directive())
    {
        warn!(error = %e, "keeping default log level");
    }
    info!("resolved bundle\n{descriptor}");

    let bundle = match descriptor.validate() {
        Ok(bundle) => bundle,
        Err(e) => {
            fatal(presenter.as_ref(), logging.as_ref(), &e.to_string());
            return Outcome::Fatal;
        },
    };

    let mut supervisor =
        Supervisor::new(bundle, paths.exe(), Arc::clone(&presenter)).with_args(args);
    if let Some(handle) = logging.clone() {
        supervisor = supervisor.with_logging(handle);
    }

    if let Err(e) = supervisor.prepare() {
        flush_to_stderr(logging.as_ref());
        supervisor.report_fatal(&e);
        return Outcome::Fatal;
    }
    supervisor.open_channel();
    if let Err(e) = supervisor.start() {
        supervisor.report_fatal(&e);
        supervisor.close_channel().await;
        return Outcome::Fatal;
    }

    let interrupted = tokio::select! {
        result = supervisor.wait() => {
            match result {
                Ok(Some(0)) => {},
                Ok(code) => info!(?code, "application finished with failure"),
                Err(e) => error!(error = %e, "lost track of the application"),
            }
            false
        },
        () = shutdown_signal() => true,
    };

    if interrupted {
        info!("shutdown requested");
        if let Err(e) = supervisor.stop().await {
            error!(error = %e, "failed to stop the application");
        }
    }
    supervisor.close_channel().await;
    Outcome::Success
}

/// Descriptor from the config file, or the first-run default when there is
/// none.
fn resolve(paths: &CocoonPaths) -> anyhow::Result<BundleDescriptor> {
    let architecture = Architecture::detect();
    let descriptor = match loader::load_existing(paths)? {
        Some(settings) => BundleDescriptor::resolve(&settings, paths, architecture),
        None => BundleDescriptor::default_for(
            paths,
            paths.asset_name(SCRIPT_EXTENSION),
            architecture,
        ),
    };
    Ok(descriptor)
}

/// Report through the presenter before any capture file exists.
fn fatal(presenter: &dyn Presenter, logging: Option<&LoggingHandle>, message: &str) {
    flush_to_stderr(logging);
    presenter.report_fatal(message);
}

/// Send buffered diagnostics to stderr when no capture file took them.
fn flush_to_stderr(logging: Option<&LoggingHandle>) {
    if let Some(handle) = logging
        && !handle.sink().is_attached()
        && let Err(e) = handle.attach(std::io::stderr())
    {
        eprintln!("Failed to flush diagnostics: {e}");
    }
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    () = ctrl_c() => {},
                    _ = term.recv() => {},
                }
            },
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                ctrl_c().await;
            },
        }
    }
    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Ctrl+C handler unavailable");
        std::future::pending::<()>().await;
    }
}
