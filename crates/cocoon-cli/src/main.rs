//! Cocoon - host application launcher.
//!
//! Started without a `metamorphose` argument, the wrapper resolves the bundle
//! described by `<exe-stem>.toml`, runs its startup scripts and supervises
//! the application. With `metamorphose morph|inject ...` it rewrites that
//! configuration instead.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::process::ExitCode;

use cocoon_config::CocoonPaths;
use cocoon_telemetry::{LogConfig, setup_logging};

mod exit;
mod launch;
mod metamorphose;
mod theme;

use exit::Outcome;
use theme::Theme;

#[tokio::main]
async fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args_os()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();

    let paths = match CocoonPaths::current() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("{}", Theme::error(&e.to_string()));
            return Outcome::Fatal.into();
        },
    };

    let args = argv.get(1..).unwrap_or_default().to_vec();
    let outcome = if metamorphose::requested(&args) {
        init_console_logging();
        metamorphose::run(&argv, &paths)
    } else {
        launch::run(args, paths).await
    };
    outcome.into()
}

/// Metamorphosis runs in the foreground: warnings go straight to stderr.
fn init_console_logging() {
    let config = LogConfig::new("warn").without_timestamps();
    match setup_logging(&config) {
        Ok(handle) => {
            if let Err(e) = handle.attach(std::io::stderr()) {
                eprintln!("Failed to initialize logging: {e}");
            }
        },
        Err(e) => eprintln!("Failed to initialize logging: {e}"),
    }
}
