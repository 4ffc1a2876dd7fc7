// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! TCP and Unix domain socket listeners behind one type.
//!
//! Both transports accept connections from a [`Listener`]. A Unix listener
//! owns its socket file and removes it when dropped, so a serve loop returning
//! (or its task being aborted) also cleans up the filesystem.

use std::io;
use std::os::fd::{AsFd, BorrowedFd};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};
use tokio::sync::oneshot;
use tokio_stream::Stream;
use tonic::transport::server::{Connected, TcpConnectInfo, UdsConnectInfo};
use tracing::{debug, warn};

use crate::config::{ListenerConfig, Network};
use crate::error::ConfigError;

const SOCKET_MODE: u32 = 0o660;

/// A bound listener, ready to accept connections.
#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixSocketListener),
}

/// A Unix listener together with the socket file it created.
#[derive(Debug)]
pub struct UnixSocketListener {
    listener: UnixListener,
    path: PathBuf,
}

impl Drop for UnixSocketListener {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed socket file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove socket file"),
        }
    }
}

impl Listener {
    /// Binds according to `config`.
    ///
    /// For Unix sockets a stale socket file is removed first and the parent
    /// directory is created if missing. The socket is made group accessible.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ConfigError> {
        match config.network {
            Network::Tcp => {
                let listener =
                    TcpListener::bind(&config.address)
                        .await
                        .map_err(|source| ConfigError::Bind {
                            address: config.to_string(),
                            source,
                        })?;
                Ok(Listener::Tcp(listener))
            }
            Network::Unix => bind_unix(Path::new(&config.address)).map(Listener::Unix),
        }
    }

    /// The configuration this listener is actually bound to. For TCP this
    /// resolves an ephemeral port to the one the kernel picked.
    pub fn local_config(&self) -> io::Result<ListenerConfig> {
        match self {
            Listener::Tcp(listener) => Ok(ListenerConfig::tcp(listener.local_addr()?.to_string())),
            Listener::Unix(unix) => Ok(ListenerConfig::unix(unix.path.to_string_lossy())),
        }
    }

    /// Printable bound address: the socket address for TCP, `unix:<path>`
    /// for Unix sockets.
    pub fn local_addr(&self) -> io::Result<String> {
        match self {
            Listener::Tcp(listener) => Ok(listener.local_addr()?.to_string()),
            Listener::Unix(unix) => Ok(format!("unix:{}", unix.path.display())),
        }
    }

    pub fn poll_accept(&self, cx: &mut Context<'_>) -> Poll<io::Result<Connection>> {
        match self {
            Listener::Tcp(listener) => listener
                .poll_accept(cx)
                .map_ok(|(stream, _)| Connection::Tcp(stream)),
            Listener::Unix(unix) => unix
                .listener
                .poll_accept(cx)
                .map_ok(|(stream, _)| Connection::Unix(stream)),
        }
    }

    pub async fn accept(&self) -> io::Result<Connection> {
        std::future::poll_fn(|cx| self.poll_accept(cx)).await
    }

    /// Turns the listener into a stream of accepted connections.
    ///
    /// Transient accept errors are yielded as items. Any other accept error
    /// ends the stream; it is then available from the returned
    /// [`AcceptFailure`].
    pub fn into_incoming(self) -> (Incoming, AcceptFailure) {
        let (failure, receiver) = oneshot::channel();
        let incoming = Incoming {
            listener: self,
            failure: Some(failure),
        };
        (incoming, AcceptFailure(receiver))
    }
}

impl AsFd for Listener {
    fn as_fd(&self) -> BorrowedFd<'_> {
        match self {
            Listener::Tcp(listener) => listener.as_fd(),
            Listener::Unix(unix) => unix.listener.as_fd(),
        }
    }
}

/// Errors that only affect the connection being accepted; the listener
/// itself is still usable.
pub(crate) fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset | io::ErrorKind::Interrupted
    )
}

fn bind_unix(path: &Path) -> Result<UnixSocketListener, ConfigError> {
    let socket_error = |source| ConfigError::SocketPath {
        path: path.display().to_string(),
        source,
    };

    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed stale socket file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(socket_error(e)),
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(socket_error)?;
    }

    let listener = UnixListener::bind(path).map_err(|source| ConfigError::Bind {
        address: format!("unix:{}", path.display()),
        source,
    })?;
    // From here on the guard owns the file and removes it on any error path.
    let unix = UnixSocketListener {
        listener,
        path: path.to_path_buf(),
    };

    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(SOCKET_MODE))
            .map_err(socket_error)?;
    }

    Ok(unix)
}

/// Stream of connections accepted from a [`Listener`].
#[derive(Debug)]
pub struct Incoming {
    listener: Listener,
    failure: Option<oneshot::Sender<io::Error>>,
}

impl Stream for Incoming {
    type Item = io::Result<Connection>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.failure.is_none() {
            return Poll::Ready(None);
        }
        match ready!(this.listener.poll_accept(cx)) {
            Ok(conn) => Poll::Ready(Some(Ok(conn))),
            Err(e) if is_transient(&e) => Poll::Ready(Some(Err(e))),
            Err(e) => {
                if let Some(failure) = this.failure.take() {
                    // The receiver may already be gone if nobody asks.
                    let _ = failure.send(e);
                }
                Poll::Ready(None)
            }
        }
    }
}

/// The error that ended an [`Incoming`] stream, if any.
#[derive(Debug)]
pub struct AcceptFailure(oneshot::Receiver<io::Error>);

impl AcceptFailure {
    /// Returns the fatal accept error, or `None` if the stream has not
    /// failed.
    pub fn take(mut self) -> Option<io::Error> {
        self.0.try_recv().ok()
    }
}

/// An accepted connection on either transport.
#[derive(Debug)]
pub enum Connection {
    Tcp(TcpStream),
    Unix(UnixStream),
}

/// Peer information for an accepted [`Connection`].
#[derive(Debug, Clone)]
pub enum ConnectInfo {
    Tcp(TcpConnectInfo),
    Unix(UdsConnectInfo),
}

impl Connected for Connection {
    type ConnectInfo = ConnectInfo;

    fn connect_info(&self) -> Self::ConnectInfo {
        match self {
            Connection::Tcp(stream) => ConnectInfo::Tcp(stream.connect_info()),
            Connection::Unix(stream) => ConnectInfo::Unix(stream.connect_info()),
        }
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Connection::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Connection::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Connection::Unix(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Connection::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_write_vectored(cx, bufs),
            Connection::Unix(stream) => Pin::new(stream).poll_write_vectored(cx, bufs),
        }
    }

    fn is_write_vectored(&self) -> bool {
        match self {
            Connection::Tcp(stream) => stream.is_write_vectored(),
            Connection::Unix(stream) => stream.is_write_vectored(),
        }
    }
}
