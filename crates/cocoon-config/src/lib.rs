#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Persisted settings and bundle resolution for the Cocoon launcher.
//!
//! The wrapper keeps its configuration in `<exe-stem>.toml` next to the
//! executable. Three tables describe the bundle:
//!
//! - `[cocoon]`: the wrapper itself (preparation script, logging, rendezvous)
//! - `[chrysalis]`: the embedded runtime registry and the active version
//! - `[larva]`: the application directory and its startup script
//!
//! [`Settings`] is the raw, loss-free store that metamorphosis commands
//! mutate. [`BundleDescriptor::resolve`] turns it into an absolute launch
//! plan, and [`BundleDescriptor::validate`] produces the [`ValidatedBundle`]
//! the supervisor requires.
//!
//! ```rust,no_run
//! use cocoon_config::{Architecture, BundleDescriptor, CocoonPaths, loader};
//!
//! let paths = CocoonPaths::current().unwrap();
//! let settings = loader::load_existing(&paths).unwrap().unwrap_or_default();
//! let bundle = BundleDescriptor::resolve(&settings, &paths, Architecture::detect())
//!     .validate()
//!     .unwrap();
//! println!("{}", *bundle);
//! ```
//!
//! This crate has no dependencies on other internal cocoon crates.

/// Bundle descriptor resolution and validation.
pub mod descriptor;
/// Configuration error types.
pub mod error;
/// Section and key names.
pub mod keys;
/// Config file discovery and default generation.
pub mod loader;
/// Wrapper location and path helpers.
pub mod paths;
/// Raw section/key/value settings store.
pub mod settings;
/// Shared value types.
pub mod types;

pub use descriptor::{BundleDescriptor, ValidatedBundle};
pub use error::{ConfigError, ConfigResult};
pub use paths::CocoonPaths;
pub use settings::Settings;
pub use types::{Architecture, LogLevel, SCRIPT_EXTENSION, Toggle, is_enabled};
