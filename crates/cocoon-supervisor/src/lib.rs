#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Process supervision for Cocoon bundles.
//!
//! A [`Supervisor`] takes a validated bundle through
//! `Idle -> Preparing -> Running -> Exited | Killed`:
//!
//! 1. [`Supervisor::prepare`] opens the stdout/stderr capture files and moves
//!    wrapper diagnostics into the stderr capture.
//! 2. [`Supervisor::open_channel`] starts the rendezvous listener when the
//!    bundle enables it.
//! 3. [`Supervisor::start`] runs the wrapper, runtime and application scripts
//!    as one chained interpreter invocation with the `COCOON_*` environment.
//! 4. [`Supervisor::wait`] blocks until the child exits, or
//!    [`Supervisor::stop`] sends `event:die` and kills it.

pub mod capture;
pub mod chain;
pub mod env;
mod error;
pub mod presenter;
mod supervisor;

pub use capture::{CaptureFiles, OutputCapture};
pub use chain::ScriptChain;
pub use env::ChildEnvironment;
pub use error::{SupervisorError, SupervisorResult};
pub use presenter::{ConsolePresenter, Presenter, PresenterHandler, attach_console};
pub use supervisor::{Supervisor, SupervisorState};
