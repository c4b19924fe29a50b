//! Platform transport: Unix domain sockets or Windows named pipes.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::{RendezvousError, RendezvousResult};
use crate::name::ChannelName;

/// Delay between connection attempts while the listener is not up yet.
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(25);

#[cfg(unix)]
mod platform {
    use std::io;
    use std::path::PathBuf;

    use tokio::net::{UnixListener, UnixStream};
    use tracing::debug;

    use crate::name::ChannelName;

    pub(crate) type ServerStream = UnixStream;
    pub(crate) type ClientStream = UnixStream;

    /// Bound socket; the socket file is removed on drop.
    pub(crate) struct Listener {
        inner: UnixListener,
        path: PathBuf,
    }

    impl Listener {
        pub(crate) fn bind(name: &ChannelName) -> io::Result<Self> {
            let path = PathBuf::from(name.as_str());

            // A previous supervisor with the same pid may have died uncleanly.
            if path.exists() {
                let _ = std::fs::remove_file(&path);
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let inner = UnixListener::bind(&path)?;
            debug!(path = %path.display(), "bound rendezvous socket");
            Ok(Self { inner, path })
        }

        pub(crate) async fn accept(&mut self) -> io::Result<ServerStream> {
            let (stream, _addr) = self.inner.accept().await?;
            Ok(stream)
        }
    }

    impl Drop for Listener {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    pub(crate) async fn connect(name: &ChannelName) -> io::Result<ClientStream> {
        UnixStream::connect(name.as_str()).await
    }

    /// Errors meaning "nobody is listening yet".
    pub(crate) fn is_not_ready(e: &io::Error) -> bool {
        matches!(
            e.kind(),
            io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
        )
    }
}

#[cfg(windows)]
mod platform {
    use std::io;

    use tokio::net::windows::named_pipe::{
        ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions,
    };
    use tracing::debug;

    use crate::name::ChannelName;

    /// `ERROR_FILE_NOT_FOUND`
    const ERROR_FILE_NOT_FOUND: i32 = 2;
    /// `ERROR_PIPE_BUSY`
    const ERROR_PIPE_BUSY: i32 = 231;

    pub(crate) type ServerStream = NamedPipeServer;
    pub(crate) type ClientStream = NamedPipeClient;

    /// Named pipe listener. A fresh instance is created for every accepted
    /// client so the name stays reachable.
    pub(crate) struct Listener {
        name: String,
        next: NamedPipeServer,
    }

    impl Listener {
        pub(crate) fn bind(name: &ChannelName) -> io::Result<Self> {
            let next = ServerOptions::new()
                .first_pipe_instance(true)
                .create(name.as_str())?;
            debug!(pipe = %name, "created rendezvous pipe");
            Ok(Self {
                name: name.as_str().to_owned(),
                next,
            })
        }

        pub(crate) async fn accept(&mut self) -> io::Result<ServerStream> {
            self.next.connect().await?;
            let fresh = ServerOptions::new().create(&self.name)?;
            Ok(std::mem::replace(&mut self.next, fresh))
        }
    }

    #[allow(clippy::unused_async)]
    pub(crate) async fn connect(name: &ChannelName) -> io::Result<ClientStream> {
        ClientOptions::new().open(name.as_str())
    }

    pub(crate) fn is_not_ready(e: &io::Error) -> bool {
        matches!(
            e.raw_os_error(),
            Some(ERROR_FILE_NOT_FOUND | ERROR_PIPE_BUSY)
        )
    }
}

pub(crate) use platform::{ClientStream, Listener, ServerStream};

/// Connect to `name`, retrying until the listener appears or `timeout` elapses.
pub(crate) async fn connect_with_retry(
    name: &ChannelName,
    timeout: Duration,
) -> RendezvousResult<ClientStream> {
    let deadline = Instant::now()
        .checked_add(timeout)
        .unwrap_or_else(Instant::now);

    loop {
        match platform::connect(name).await {
            Ok(stream) => return Ok(stream),
            Err(e) if platform::is_not_ready(&e) => {
                if Instant::now() >= deadline {
                    return Err(RendezvousError::ConnectTimeout {
                        name: name.to_string(),
                        timeout,
                    });
                }
                debug!(channel = %name, error = %e, "rendezvous listener not ready");
                tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
            },
            Err(e) => return Err(RendezvousError::Io(e)),
        }
    }
}
