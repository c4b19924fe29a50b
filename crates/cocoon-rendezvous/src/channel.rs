//! Single owner of a channel name and its two roles.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::error::{RendezvousError, RendezvousResult};
use crate::message::RendezvousMessage;
use crate::name::ChannelName;
use crate::notify::{DEFAULT_NOTIFY_WINDOW, notify};
use crate::server::{ListenerStats, MessageHandler, RendezvousServer};

/// What the channel is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendezvousRole {
    /// Nothing bound.
    Idle,
    /// Serving clients in listen mode.
    Listening,
}

/// Owns a channel name. Listen and notify are never active at the same time:
/// [`Rendezvous::notify`] shuts the listener down before rebinding the name.
#[derive(Debug)]
pub struct Rendezvous {
    name: ChannelName,
    server: Option<RendezvousServer>,
    notify_window: Duration,
}

impl Rendezvous {
    /// Idle channel for `name`.
    #[must_use]
    pub fn new(name: ChannelName) -> Self {
        Self {
            name,
            server: None,
            notify_window: DEFAULT_NOTIFY_WINDOW,
        }
    }

    /// Override how long notify waits for a peer.
    #[must_use]
    pub fn with_notify_window(mut self, window: Duration) -> Self {
        self.notify_window = window;
        self
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &ChannelName {
        &self.name
    }

    /// Current role.
    #[must_use]
    pub fn role(&self) -> RendezvousRole {
        if self.server.is_some() {
            RendezvousRole::Listening
        } else {
            RendezvousRole::Idle
        }
    }

    /// Whether listen mode is active.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.role() == RendezvousRole::Listening
    }

    /// Listener counters, while listening.
    #[must_use]
    pub fn stats(&self) -> Option<&ListenerStats> {
        self.server.as_ref().map(RendezvousServer::stats)
    }

    /// Enter listen mode.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::AlreadyListening`] if already listening, or
    /// an I/O error if the name cannot be bound.
    pub fn listen(&mut self, handler: Arc<dyn MessageHandler>) -> RendezvousResult<()> {
        if self.server.is_some() {
            return Err(RendezvousError::AlreadyListening {
                name: self.name.to_string(),
            });
        }
        self.server = Some(RendezvousServer::listen(self.name.clone(), handler)?);
        Ok(())
    }

    /// Leave listen mode, if active.
    pub async fn close(&mut self) {
        if let Some(server) = self.server.take() {
            server.shutdown().await;
        }
    }

    /// Deliver one message in notify mode, closing the listener first.
    ///
    /// # Errors
    ///
    /// See [`notify`].
    pub async fn notify(&mut self, message: &RendezvousMessage) -> RendezvousResult<()> {
        if self.server.is_some() {
            self.close().await;
        }
        let result = notify(&self.name, message, self.notify_window).await;
        if let Err(e) = &result {
            warn!(channel = %self.name, error = %e, "rendezvous notification not delivered");
        }
        result
    }
}
