use std::path::PathBuf;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::oneshot;

use sockroute_core::error::Result;
use sockroute_core::protocol::SocketResponse;

/// Server-assigned connection identity.
pub type ConnectionId = u64;

/// A frame queued for a connection's writer task.
#[derive(Debug)]
pub struct Outbound {
    /// Serialized message, delimiter included.
    pub frame: Bytes,
    /// Half-close the socket once the frame is flushed.
    pub end_connection: bool,
    /// Completion notification, fired after the write (and shutdown) finished.
    pub ack: Option<oneshot::Sender<Result<()>>>,
}

/// Arguments of [`crate::ipc::IpcServer::send_response`].
#[derive(Debug, Clone)]
pub struct SendResponse {
    pub connection_id: ConnectionId,
    pub response: SocketResponse,
    pub end_connection: bool,
}

/// Arguments of [`crate::ipc::IpcServer::broadcast`].
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub channel: String,
    pub data: Value,
    /// Connections excluded from delivery.
    pub blacklist: Vec<ConnectionId>,
}

impl Broadcast {
    pub fn new(channel: impl Into<String>, data: Value) -> Self {
        Self {
            channel: channel.into(),
            data,
            blacklist: Vec::new(),
        }
    }

    pub fn except(mut self, ids: impl IntoIterator<Item = ConnectionId>) -> Self {
        self.blacklist.extend(ids);
        self
    }
}

/// Options for [`crate::ipc::IpcServer::listen`].
#[derive(Debug, Clone, Default)]
pub struct ListenOptions {
    /// Remove a stale socket file before binding.
    pub delete_socket_before_listening: bool,
}

/// Transport-level server events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Listening { socket_path: PathBuf },
    Connection { connection_id: ConnectionId },
    ConnectionClosed { connection_id: ConnectionId },
    Error { message: String },
    Closed,
}
