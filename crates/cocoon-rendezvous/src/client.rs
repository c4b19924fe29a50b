//! Client side of the channel, as used by a child process.

use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};

use crate::error::{RendezvousError, RendezvousResult};
use crate::message::RendezvousMessage;
use crate::name::ChannelName;
use crate::server::read_message;
use crate::transport::connect_with_retry;

/// How long a client keeps retrying while the listener is not up.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to a listening supervisor and write one message.
///
/// # Errors
///
/// Returns an error if the channel is unreachable or the write fails.
pub async fn send(name: &ChannelName, message: &RendezvousMessage) -> RendezvousResult<()> {
    let mut stream = connect_with_retry(name, DEFAULT_CONNECT_TIMEOUT).await?;
    stream.write_all(message.to_line().as_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await?;
    Ok(())
}

/// Connect to a notifying supervisor and read the one message it sends.
///
/// # Errors
///
/// Returns an error if the channel is unreachable, the peer closes without
/// sending a line, or the line is malformed.
pub async fn receive(name: &ChannelName) -> RendezvousResult<RendezvousMessage> {
    receive_within(name, DEFAULT_CONNECT_TIMEOUT).await
}

/// [`receive`] with an explicit connect deadline.
///
/// # Errors
///
/// See [`receive`].
pub async fn receive_within(
    name: &ChannelName,
    timeout: Duration,
) -> RendezvousResult<RendezvousMessage> {
    let stream = connect_with_retry(name, timeout).await?;
    let mut reader = BufReader::new(stream);
    read_message(&mut reader)
        .await?
        .ok_or(RendezvousError::ConnectionClosed)
}
