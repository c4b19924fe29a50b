//! `cocoon metamorphose`: change the installed wrapper's configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use cocoon_config::{CocoonPaths, LogLevel, Settings, Toggle, loader};
use cocoon_metamorphosis::{InjectRequest, MorphOverrides, OverrideField, inject, morph};
use tracing::{debug, error};

use crate::exit::Outcome;
use crate::theme::Theme;

/// Word that switches the wrapper from launching to metamorphosis.
pub(crate) const METAMORPHOSE: &str = "metamorphose";

/// Cocoon metamorphosis commands.
#[derive(Debug, Parser)]
#[command(name = "cocoon", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: TopCommand,
}

#[derive(Debug, Subcommand)]
enum TopCommand {
    /// Change the wrapper configuration
    Metamorphose {
        #[command(subcommand)]
        action: Action,
    },
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Override individual settings
    Morph(MorphArgs),
    /// Install a runtime bundle as a new version and activate it
    Inject(InjectArgs),
}

#[derive(Debug, Args)]
struct MorphArgs {
    /// Wrapper preparation script
    #[arg(long)]
    cocoon_startup: Option<String>,

    /// Wrapper log level
    #[arg(long, value_enum)]
    cocoon_loglevel: Option<LogLevel>,

    /// Prefix of the output capture files
    #[arg(long)]
    cocoon_logname: Option<String>,

    /// Enable the rendezvous channel
    #[arg(long, value_enum, ignore_case = true)]
    cocoon_usepipe: Option<Toggle>,

    /// Runtime version to activate
    #[arg(long)]
    chrysalis_dir: Option<String>,

    /// Application startup script
    #[arg(long)]
    larva_startup: Option<String>,
}

impl From<MorphArgs> for MorphOverrides {
    fn from(args: MorphArgs) -> Self {
        Self {
            cocoon_startup: args.cocoon_startup,
            cocoon_loglevel: args.cocoon_loglevel.map(|l| l.as_str().to_owned()),
            cocoon_logname: args.cocoon_logname,
            cocoon_usepipe: args.cocoon_usepipe.map(|t| t.as_str().to_owned()),
            chrysalis_dir: args.chrysalis_dir,
            larva_startup: args.larva_startup,
        }
    }
}

#[derive(Debug, Args)]
struct InjectArgs {
    /// Version directory name
    name: String,

    /// Bundle archive (zip or tar.gz)
    archive: PathBuf,

    /// Delete every other installed version
    #[arg(value_enum, ignore_case = true)]
    drop_others: Option<Toggle>,
}

impl From<InjectArgs> for InjectRequest {
    fn from(args: InjectArgs) -> Self {
        InjectRequest::new(args.name, args.archive)
            .with_drop_others(args.drop_others.is_some_and(Toggle::is_enabled))
    }
}

/// Whether `args` ask for a metamorphosis instead of a launch.
pub(crate) fn requested(args: &[String]) -> bool {
    args.iter().any(|a| a == METAMORPHOSE)
}

/// Parse and apply a metamorphosis command line (program name included).
pub(crate) fn run(argv: &[String], paths: &CocoonPaths) -> Outcome {
    let cli = match Cli::try_parse_from(argv) {
        Ok(cli) => cli,
        Err(e) => {
            let outcome = if e.use_stderr() {
                Outcome::Failed
            } else {
                Outcome::Success
            };
            let _ = e.print();
            return outcome;
        },
    };
    let TopCommand::Metamorphose { action } = cli.command;

    match apply(action, paths, Utc::now()) {
        Ok(true) => {
            println!("{}", Theme::success("Metamorphosis applied"));
            Outcome::Success
        },
        Ok(false) => {
            println!("{}", Theme::warning("Nothing to change"));
            Outcome::Unchanged
        },
        Err(e) => {
            error!(error = %format!("{e:#}"), "metamorphosis failed");
            eprintln!("{}", Theme::error(&format!("{e:#}")));
            Outcome::Failed
        },
    }
}

/// Load (or create) the settings, apply `action` and save when it changed
/// something. Returns whether anything changed.
fn apply(action: Action, paths: &CocoonPaths, now: DateTime<Utc>) -> Result<bool> {
    let config_path = paths.config_file();
    let mut settings = loader::load_or_create(paths, now)
        .with_context(|| format!("cannot load {}", config_path.display()))?;

    let changed = match action {
        Action::Morph(args) => {
            let overrides = MorphOverrides::from(args);
            let changed = morph(&overrides, &mut settings, paths);
            if changed {
                print_changes(&overrides, &settings);
            }
            changed
        },
        Action::Inject(args) => inject(&InjectRequest::from(args), &mut settings, paths),
    };

    if changed {
        settings.stamp_metamorphosis(now);
        settings
            .save(&config_path)
            .with_context(|| format!("cannot save {}", config_path.display()))?;
        debug!(path = %config_path.display(), "settings saved");
    }
    Ok(changed)
}

fn print_changes(overrides: &MorphOverrides, settings: &Settings) {
    println!("{}", Theme::header("Metamorphosis"));
    for field in OverrideField::ALL {
        if overrides.get(field).is_some()
            && let Some(value) = settings.get(field.section(), field.key())
        {
            println!("{}", Theme::change(field.section(), field.key(), &value));
        }
    }
}
