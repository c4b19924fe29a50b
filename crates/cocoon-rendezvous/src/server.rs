//! Listen mode: a persistent listener serving every client that connects.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{RendezvousError, RendezvousResult};
use crate::message::{MessageKind, RendezvousMessage};
use crate::name::ChannelName;
use crate::transport::{Listener, ServerStream};

/// Longest accepted line, terminator included.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Receiver of the messages that need the operator's attention.
pub trait MessageHandler: Send + Sync + 'static {
    /// Show `text` to the operator (`messagebox:<text>`).
    fn message_box(&self, text: &str);

    /// A lifecycle event announced by the child (`event:<name>`).
    fn event(&self, name: &str) {
        info!(event = name, "rendezvous event");
    }
}

/// Counters maintained by a running listener.
#[derive(Debug, Default)]
pub struct ListenerStats {
    accepted: AtomicU64,
    messages: AtomicU64,
    protocol_errors: AtomicU64,
}

impl ListenerStats {
    /// Connections accepted.
    #[must_use]
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Well-formed messages dispatched.
    #[must_use]
    pub fn messages(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    /// Connections dropped because of a malformed or oversized line.
    #[must_use]
    pub fn protocol_errors(&self) -> u64 {
        self.protocol_errors.load(Ordering::Relaxed)
    }
}

/// Handle to a running listener. Dropping it stops accepting.
#[derive(Debug)]
pub struct RendezvousServer {
    name: ChannelName,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    stats: Arc<ListenerStats>,
}

impl RendezvousServer {
    /// Bind `name` and start serving clients in the background.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be bound.
    pub fn listen(name: ChannelName, handler: Arc<dyn MessageHandler>) -> RendezvousResult<Self> {
        let listener = Listener::bind(&name)?;
        let cancel = CancellationToken::new();
        let stats = Arc::new(ListenerStats::default());

        let task = tokio::spawn(accept_loop(
            listener,
            handler,
            Arc::clone(&stats),
            cancel.clone(),
        ));
        info!(channel = %name, "rendezvous channel listening");

        Ok(Self {
            name,
            cancel,
            task: Some(task),
            stats,
        })
    }

    /// Channel this server is bound to.
    #[must_use]
    pub fn name(&self) -> &ChannelName {
        &self.name
    }

    /// Live counters.
    #[must_use]
    pub fn stats(&self) -> &ListenerStats {
        &self.stats
    }

    /// Stop accepting, abort open connections and release the channel name.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(channel = %self.name, error = %e, "rendezvous accept loop failed");
            }
        }
        debug!(channel = %self.name, "rendezvous channel closed");
    }
}

impl Drop for RendezvousServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn accept_loop(
    mut listener: Listener,
    handler: Arc<dyn MessageHandler>,
    stats: Arc<ListenerStats>,
    cancel: CancellationToken,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(stream) => {
                    stats.accepted.fetch_add(1, Ordering::Relaxed);
                    connections.spawn(serve_connection(
                        stream,
                        Arc::clone(&handler),
                        Arc::clone(&stats),
                    ));
                },
                Err(e) => {
                    warn!(error = %e, "failed to accept rendezvous connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                },
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined
                    && e.is_panic()
                {
                    warn!(error = %e, "rendezvous connection handler panicked");
                }
            },
        }
    }

    connections.shutdown().await;
    drop(listener);
}

async fn serve_connection(
    stream: ServerStream,
    handler: Arc<dyn MessageHandler>,
    stats: Arc<ListenerStats>,
) {
    let mut reader = BufReader::new(stream);

    loop {
        match read_message(&mut reader).await {
            Ok(Some(message)) => {
                dispatch(&message, handler.as_ref());
                stats.messages.fetch_add(1, Ordering::Relaxed);
            },
            Ok(None) => break,
            Err(RendezvousError::Io(e)) if e.kind() != std::io::ErrorKind::InvalidData => {
                debug!(error = %e, "rendezvous connection read failed");
                break;
            },
            Err(e) => {
                stats.protocol_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "dropping rendezvous connection");
                break;
            },
        }
    }
}

/// Read and parse the next line; `None` on a clean end of stream.
pub(crate) async fn read_message<R>(
    reader: &mut BufReader<R>,
) -> RendezvousResult<Option<RendezvousMessage>>
where
    R: AsyncRead + Unpin,
{
    let mut line = String::new();
    let limit = u64::try_from(MAX_LINE_LEN).unwrap_or(u64::MAX);
    let read = reader.take(limit).read_line(&mut line).await?;

    if read == 0 {
        return Ok(None);
    }
    if read >= MAX_LINE_LEN && !line.ends_with('\n') {
        return Err(RendezvousError::LineTooLong {
            limit: MAX_LINE_LEN,
        });
    }
    RendezvousMessage::parse(&line).map(Some)
}

fn dispatch(message: &RendezvousMessage, handler: &dyn MessageHandler) {
    match message.kind() {
        MessageKind::MessageBox => handler.message_box(message.value()),
        MessageKind::Log => info!(target: "cocoon::child", "{}", message.value()),
        MessageKind::Event => handler.event(message.value()),
        MessageKind::Unknown => {
            warn!(key = message.key(), "ignoring unrecognized rendezvous message");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_all(input: &[u8]) -> Vec<RendezvousResult<Option<RendezvousMessage>>> {
        let mut reader = BufReader::new(input);
        let mut out = Vec::new();
        loop {
            let next = read_message(&mut reader).await;
            let stop = !matches!(next, Ok(Some(_)));
            out.push(next);
            if stop {
                return out;
            }
        }
    }

    #[tokio::test]
    async fn test_read_message_sequence() {
        let results = read_all(b"log:one\nevent:die\n").await;
        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0].as_ref().unwrap().as_ref().unwrap().value(),
            "one"
        );
        assert!(results[1].as_ref().unwrap().as_ref().unwrap().is_die());
        assert!(matches!(results[2], Ok(None)));
    }

    #[tokio::test]
    async fn test_read_message_unterminated_last_line() {
        let results = read_all(b"messagebox:hello").await;
        assert_eq!(
            results[0].as_ref().unwrap().as_ref().unwrap().kind(),
            MessageKind::MessageBox
        );
    }

    #[tokio::test]
    async fn test_read_message_malformed() {
        let results = read_all(b"garbage\nlog:never\n").await;
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(RendezvousError::MalformedLine { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_message_too_long() {
        let mut input = b"log:".to_vec();
        input.resize(MAX_LINE_LEN.saturating_add(10), b'x');
        input.push(b'\n');
        let results = read_all(&input).await;
        assert!(matches!(
            results[0],
            Err(RendezvousError::LineTooLong { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_message_invalid_utf8() {
        let results = read_all(b"log:\xff\xfe\n").await;
        assert!(matches!(&results[0], Err(RendezvousError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData));
    }
}
