#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Local rendezvous channel between the Cocoon supervisor and its child.
//!
//! The channel is a Unix domain socket (`<tmp>/cocoon_<pid>.sock`) or a
//! Windows named pipe (`\\.\pipe\cocoon_<pid>`) carrying UTF-8 lines of the
//! form `key:value`. It has two roles, owned by a single [`Rendezvous`]:
//!
//! - **Listen**: the supervisor accepts any number of clients and dispatches
//!   `messagebox`, `log` and `event` lines they send.
//! - **Notify**: the supervisor rebinds the name, hands one line (normally
//!   `event:die`) to the first client that connects, and closes.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cocoon_rendezvous::{ChannelName, MessageHandler, Rendezvous, RendezvousMessage};
//!
//! struct Print;
//! impl MessageHandler for Print {
//!     fn message_box(&self, text: &str) {
//!         println!("{text}");
//!     }
//! }
//!
//! # async fn run() -> cocoon_rendezvous::RendezvousResult<()> {
//! let mut channel = Rendezvous::new(ChannelName::current());
//! channel.listen(Arc::new(Print))?;
//! // ... child runs ...
//! channel.notify(&RendezvousMessage::die()).await?;
//! # Ok(())
//! # }
//! ```

mod channel;
pub mod client;
mod error;
mod message;
mod name;
mod notify;
mod server;
mod transport;

pub use channel::{Rendezvous, RendezvousRole};
pub use error::{RendezvousError, RendezvousResult};
pub use message::{DIE, EVENT, LOG, MESSAGEBOX, MessageKind, RendezvousMessage};
pub use name::ChannelName;
pub use notify::{DEFAULT_NOTIFY_WINDOW, notify};
pub use server::{ListenerStats, MAX_LINE_LEN, MessageHandler, RendezvousServer};
