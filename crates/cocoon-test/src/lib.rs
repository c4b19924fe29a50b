//! Cocoon Test - Shared test utilities for the Cocoon launcher.
//!
//! Provides a throwaway wrapper directory ([`CocoonFixture`]) and builders
//! for runtime bundle archives. Intended as a dev-dependency only.
//!
//! ```rust,ignore
//! use cocoon_test::CocoonFixture;
//!
//! let fixture = CocoonFixture::new("MyApp");
//! fixture.write_config("[larva]\nstartup = \"run.sh\"\n");
//! let paths = fixture.paths();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod archive;
pub mod harness;

pub use archive::*;
pub use harness::*;
