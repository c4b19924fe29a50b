#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Metamorphosis: changing an installed Cocoon wrapper without reinstalling it.
//!
//! Two operations mutate the persisted [`Settings`](cocoon_config::Settings)
//! and report whether anything changed:
//!
//! - [`morph`] applies command-line overrides to individual keys. Switching
//!   the runtime version also pulls the architecture directories and init
//!   script from that version's `chrysalis.toml`.
//! - [`inject`] unpacks a runtime bundle archive as a new version, activates
//!   it and optionally deletes the other versions.
//!
//! Callers stamp `metamorphosis.date` and save the settings afterwards.

pub mod archive;
mod error;
mod inject;
mod overrides;
mod prune;

pub use archive::ArchiveFormat;
pub use error::{MetamorphosisError, MetamorphosisResult};
pub use inject::{InjectOutcome, InjectRequest, inject, try_inject};
pub use overrides::{MorphOverrides, OverrideField, apply_runtime_version, morph};
pub use prune::{PruneReport, prune_except};
