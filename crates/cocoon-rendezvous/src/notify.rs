//! Notify mode: deliver exactly one message to the next client, then close.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{RendezvousError, RendezvousResult};
use crate::message::RendezvousMessage;
use crate::name::ChannelName;
use crate::transport::Listener;

/// How long notify waits for the child to connect.
pub const DEFAULT_NOTIFY_WINDOW: Duration = Duration::from_secs(3);

/// Open a fresh listener on `name`, hand `message` to the first client that
/// connects within `window`, then close the channel.
///
/// # Errors
///
/// Returns [`RendezvousError::NotifyTimeout`] if nobody connects in time, or
/// an I/O error if binding or writing fails.
pub async fn notify(
    name: &ChannelName,
    message: &RendezvousMessage,
    window: Duration,
) -> RendezvousResult<()> {
    let mut listener = Listener::bind(name)?;
    debug!(channel = %name, ?window, "waiting for rendezvous peer");

    let mut stream = tokio::time::timeout(window, listener.accept())
        .await
        .map_err(|_| RendezvousError::NotifyTimeout {
            name: name.to_string(),
            window,
        })??;

    stream.write_all(message.to_line().as_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await?;
    drop(listener);

    info!(channel = %name, message = %message, "rendezvous notification delivered");
    Ok(())
}
