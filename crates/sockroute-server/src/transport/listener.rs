//! Stream listener: Unix domain socket, or a named pipe on Windows.

use std::io;
use std::path::Path;

use tokio::sync::watch;

use sockroute_core::error::Result;

use crate::ipc::{IpcServer, ServerEvent};
use crate::transport::connection::serve_connection;

#[cfg(unix)]
pub(crate) type Stream = tokio::net::UnixStream;

#[cfg(windows)]
pub(crate) type Stream = tokio::net::windows::named_pipe::NamedPipeServer;

#[cfg(unix)]
pub struct Listener {
    inner: tokio::net::UnixListener,
}

#[cfg(unix)]
impl Listener {
    pub fn bind(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let inner = tokio::net::UnixListener::bind(path)?;
        Ok(Self { inner })
    }

    pub async fn accept(&mut self) -> io::Result<Stream> {
        let (stream, _addr) = self.inner.accept().await?;
        Ok(stream)
    }
}

#[cfg(windows)]
pub struct Listener {
    path: std::path::PathBuf,
    next: tokio::net::windows::named_pipe::NamedPipeServer,
}

#[cfg(windows)]
impl Listener {
    pub fn bind(path: &Path) -> Result<Self> {
        use tokio::net::windows::named_pipe::ServerOptions;

        let next = ServerOptions::new()
            .first_pipe_instance(true)
            .create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            next,
        })
    }

    /// Wait for a client on the pending instance, then queue a fresh one.
    pub async fn accept(&mut self) -> io::Result<Stream> {
        use tokio::net::windows::named_pipe::ServerOptions;

        self.next.connect().await?;
        let fresh = ServerOptions::new().create(&self.path)?;
        Ok(std::mem::replace(&mut self.next, fresh))
    }
}

/// Accept connections until shutdown is signalled.
pub(crate) async fn accept_loop(server: IpcServer, mut listener: Listener, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok(stream) => {
                        tokio::spawn(serve_connection(server.clone(), stream));
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "accept failed");
                        server.emit(ServerEvent::Error { message: err.to_string() });
                    }
                }
            }
        }
    }
    tracing::debug!("accept loop stopped");
}
