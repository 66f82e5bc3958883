use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use tokio::sync::{broadcast, oneshot, watch};

use sockroute_core::address::{self, SocketAddress};
use sockroute_core::error::{ErrorCode, IpcError, Result};
use sockroute_core::protocol::{
    codec, normalize_channels, Category, ChannelsRequest, Delimiter, GeneralRequest,
    GeneralResponsePayload, SocketRequest, SocketResponse,
};

use crate::ipc::channels::{ChannelRegistry, Membership};
use crate::ipc::connections::ConnectionRegistry;
use crate::ipc::types::{Broadcast, ConnectionId, ListenOptions, Outbound, SendResponse, ServerEvent};
use crate::transport::{self, codec::Inbound};

const EVENT_CAPACITY: usize = 256;

/// Receiver of validated `general` requests (the routing layer).
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, server: IpcServer, connection_id: ConnectionId, request: GeneralRequest);
}

/// Server construction options.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Single-character message delimiter.
    pub delimiter: String,
    /// Directory `{namespace, id}` addresses are resolved against.
    pub socket_root: PathBuf,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            delimiter: sockroute_core::protocol::DEFAULT_DELIMITER.to_string(),
            socket_root: address::default_socket_root(),
        }
    }
}

/// IPC server: accepts stream connections and multiplexes requests,
/// responses and channel broadcasts over each of them.
#[derive(Clone)]
pub struct IpcServer {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    delimiter: Delimiter,
    socket_root: PathBuf,
    connections: ConnectionRegistry,
    channels: ChannelRegistry,
    membership: Membership,
    handler: Arc<dyn RequestHandler>,
    listening: Mutex<Option<Listening>>,
    events: broadcast::Sender<ServerEvent>,
}

struct Listening {
    socket_path: PathBuf,
    shutdown: watch::Sender<bool>,
}

impl IpcServer {
    pub fn new(options: ServerOptions, handler: Arc<dyn RequestHandler>) -> Result<Self> {
        let delimiter = Delimiter::parse(&options.delimiter)?;
        address::validate_socket_root(&options.socket_root)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(ServerInner {
                delimiter,
                socket_root: options.socket_root,
                connections: ConnectionRegistry::new(),
                channels: ChannelRegistry::new(),
                membership: Membership::new(),
                handler,
                listening: Mutex::new(None),
                events,
            }),
        })
    }

    pub fn delimiter(&self) -> Delimiter {
        self.inner.delimiter
    }

    /// Socket path, once listening.
    pub fn socket_path(&self) -> Option<PathBuf> {
        self.listening().as_ref().map(|l| l.socket_path.clone())
    }

    /// Transport events (listening, connections, errors, close).
    pub fn events(&self) -> broadcast::Receiver<ServerEvent> {
        self.inner.events.subscribe()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.count()
    }

    /// Channels a connection is currently subscribed to.
    pub fn subscriptions(&self, connection_id: ConnectionId) -> Vec<String> {
        self.inner.membership.channels_of(connection_id)
    }

    fn listening(&self) -> std::sync::MutexGuard<'_, Option<Listening>> {
        self.inner
            .listening
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn emit(&self, event: ServerEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Bind the socket and start accepting connections in the background.
    pub async fn listen(&self, address: &SocketAddress, options: ListenOptions) -> Result<PathBuf> {
        let socket_path = address.resolve(&self.inner.socket_root)?;

        if self.listening().is_some() {
            return Err(IpcError::usage(
                ErrorCode::AlreadyListening,
                "the server is already listening",
            ));
        }

        if options.delete_socket_before_listening {
            address::remove_socket_file(&socket_path)?;
        }

        let listener = transport::Listener::bind(&socket_path)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        {
            let mut guard = self.listening();
            if guard.is_some() {
                return Err(IpcError::usage(
                    ErrorCode::AlreadyListening,
                    "the server is already listening",
                ));
            }
            *guard = Some(Listening {
                socket_path: socket_path.clone(),
                shutdown: shutdown_tx,
            });
        }

        tracing::info!(socket_path = %socket_path.display(), "ipc server listening");
        self.emit(ServerEvent::Listening {
            socket_path: socket_path.clone(),
        });

        tokio::spawn(transport::accept_loop(self.clone(), listener, shutdown_rx));
        Ok(socket_path)
    }

    /// Stop accepting connections and release the socket path. Idempotent.
    ///
    /// Connections that are already open stay open.
    pub fn close(&self) {
        let Some(listening) = self.listening().take() else {
            return;
        };

        let _ = listening.shutdown.send(true);
        if let Err(e) = address::remove_socket_file(&listening.socket_path) {
            tracing::warn!(socket_path = %listening.socket_path.display(), error = %e, "failed to remove socket file");
        }

        tracing::info!(socket_path = %listening.socket_path.display(), "ipc server closed");
        self.emit(ServerEvent::Closed);
    }

    pub fn create_channels<I, S>(&self, channels: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for channel in normalize_channels(channels)? {
            self.inner.channels.create(&channel);
        }
        Ok(())
    }

    /// Remove channels from the registry. Existing memberships are kept.
    pub fn delete_channels<I, S>(&self, channels: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for channel in normalize_channels(channels)? {
            self.inner.channels.delete(&channel);
        }
        Ok(())
    }

    pub fn channel_exists(&self, channel: &str) -> bool {
        self.inner.channels.exists(channel)
    }

    /// Best-effort fan-out to every subscriber of a channel.
    ///
    /// Returns how many connections the message was queued for; per-connection
    /// failures are skipped.
    pub fn broadcast(&self, broadcast: Broadcast) -> Result<usize> {
        let Broadcast {
            channel,
            data,
            blacklist,
        } = broadcast;

        if !self.inner.channels.exists(&channel) {
            return Err(IpcError::usage(
                ErrorCode::UnknownChannel,
                format!("No channel exists with the name: {channel:?}"),
            ));
        }
        if !data.is_object() {
            return Err(IpcError::usage(
                ErrorCode::InvalidBroadcastData,
                "Broadcast data must be a non-null object",
            ));
        }

        // serialize once, send N times
        let frame = codec::encode(&SocketResponse::broadcast(channel.as_str(), data), self.inner.delimiter)?;

        let mut delivered = 0;
        for id in self.inner.membership.members_of(&channel) {
            if blacklist.contains(&id) {
                continue;
            }
            match self.enqueue(id, frame.clone(), false, None) {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(e) => tracing::debug!(connection_id = id, channel = %channel, error = %e, "broadcast delivery skipped"),
            }
        }

        tracing::debug!(channel = %channel, delivered, "broadcast");
        Ok(delivered)
    }

    /// Queue a response on a connection without waiting for the write.
    ///
    /// A connection that no longer exists is not an error.
    pub fn queue_response(&self, connection_id: ConnectionId, response: &SocketResponse, end_connection: bool) -> Result<()> {
        let frame = self.prepare(response)?;
        self.enqueue(connection_id, frame, end_connection, None)?;
        Ok(())
    }

    /// Send a response and wait until it is flushed (and, with
    /// `end_connection`, until the socket is half-closed).
    pub async fn send_response(&self, args: SendResponse) -> Result<()> {
        let frame = self.prepare(&args.response)?;
        let (ack_tx, ack_rx) = oneshot::channel();
        if !self.enqueue(args.connection_id, frame, args.end_connection, Some(ack_tx))? {
            return Ok(());
        }
        // Writer gone before acking means the connection closed meanwhile.
        ack_rx.await.unwrap_or(Ok(()))
    }

    fn prepare(&self, response: &SocketResponse) -> Result<Bytes> {
        if !response.payload().is_object() {
            return Err(IpcError::usage(
                ErrorCode::InvalidResponsePayload,
                "Response payload must be an object",
            ));
        }
        codec::encode(response, self.inner.delimiter)
    }

    /// Returns `Ok(false)` when the connection is gone.
    fn enqueue(
        &self,
        connection_id: ConnectionId,
        frame: Bytes,
        end_connection: bool,
        ack: Option<oneshot::Sender<Result<()>>>,
    ) -> Result<bool> {
        let Some(conn) = self.inner.connections.get(connection_id) else {
            return Ok(false);
        };
        let out = Outbound {
            frame,
            end_connection,
            ack,
        };
        match conn.tx.send(out) {
            Ok(()) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    pub(crate) fn register_connection(&self, tx: tokio::sync::mpsc::UnboundedSender<Outbound>) -> ConnectionId {
        let id = self.inner.connections.insert(tx);
        tracing::debug!(connection_id = id, "connection opened");
        self.emit(ServerEvent::Connection { connection_id: id });
        id
    }

    /// Forget a connection and its channel memberships. Idempotent.
    pub(crate) fn remove_connection(&self, connection_id: ConnectionId) {
        if self.inner.connections.remove(connection_id).is_none() {
            return;
        }
        self.inner.membership.cleanup_connection(connection_id);
        tracing::debug!(connection_id, "connection closed");
        self.emit(ServerEvent::ConnectionClosed { connection_id });
    }

    pub(crate) fn is_connected(&self, connection_id: ConnectionId) -> bool {
        self.inner.connections.contains(connection_id)
    }

    /// Decode, validate and route one complete frame.
    pub(crate) fn handle_frame(&self, connection_id: ConnectionId, frame: &[u8]) {
        if !self.is_connected(connection_id) {
            return;
        }

        let request = match transport::codec::decode(frame) {
            Inbound::Request(r) => r,
            Inbound::Rejected(rejection) => {
                tracing::debug!(connection_id, request_id = %rejection.id, code = rejection.error.code(), "rejecting invalid request");
                self.reply_error(connection_id, &rejection.id, rejection.category, &rejection.error);
                return;
            }
        };

        match request {
            SocketRequest::General(request) => {
                let server = self.clone();
                let handler = Arc::clone(&self.inner.handler);
                tokio::spawn(async move {
                    handler.handle(server, connection_id, request).await;
                });
            }
            SocketRequest::Subscribe(request) => self.subscribe(connection_id, request),
            SocketRequest::Unsubscribe(request) => self.unsubscribe(connection_id, request),
        }
    }

    fn subscribe(&self, connection_id: ConnectionId, request: ChannelsRequest) {
        for channel in &request.payload.channels {
            if self.inner.channels.exists(channel) {
                self.inner.membership.join(channel, connection_id);
            }
        }
        // The connection may have closed while joining; its cleanup already ran.
        if !self.is_connected(connection_id) {
            self.inner.membership.cleanup_connection(connection_id);
            return;
        }
        let message = format!("Subscribed to channels: {}", request.payload.channels.join(", "));
        self.reply_ok(connection_id, &request, message);
    }

    fn unsubscribe(&self, connection_id: ConnectionId, request: ChannelsRequest) {
        for channel in &request.payload.channels {
            self.inner.membership.leave(channel, connection_id);
        }
        let message = format!("Unsubscribed from channels: {}", request.payload.channels.join(", "));
        self.reply_ok(connection_id, &request, message);
    }

    fn reply_ok(&self, connection_id: ConnectionId, request: &ChannelsRequest, message: String) {
        let response = SocketResponse::reply(
            &request.metadata,
            false,
            GeneralResponsePayload {
                headers: Default::default(),
                body: json!({ "message": message }),
            },
        );
        if let Err(e) = self.queue_response(connection_id, &response, false) {
            tracing::warn!(connection_id, error = %e, "failed to queue reply");
        }
    }

    fn reply_error(&self, connection_id: ConnectionId, id: &str, category: Category, err: &IpcError) {
        let response = SocketResponse::error(id, category, err);
        if let Err(e) = self.queue_response(connection_id, &response, false) {
            tracing::warn!(connection_id, error = %e, "failed to queue error reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoRoutes;

    #[async_trait]
    impl RequestHandler for NoRoutes {
        async fn handle(&self, _server: IpcServer, _connection_id: ConnectionId, _request: GeneralRequest) {}
    }

    fn channels_request(channels: &[&str]) -> ChannelsRequest {
        ChannelsRequest {
            metadata: sockroute_core::protocol::RequestMetadata {
                id: "1".into(),
                category: Category::Subscribe,
            },
            payload: sockroute_core::protocol::ChannelsPayload {
                channels: channels.iter().map(|c| (*c).to_owned()).collect(),
            },
        }
    }

    #[test]
    fn subscribe_from_a_closed_connection_leaves_no_membership() {
        let server = IpcServer::new(
            ServerOptions {
                socket_root: PathBuf::from("/tmp"),
                ..ServerOptions::default()
            },
            Arc::new(NoRoutes),
        )
        .unwrap();
        server.create_channels(["news"]).unwrap();

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let id = server.register_connection(tx);
        server.remove_connection(id);

        server.subscribe(id, channels_request(&["news"]));
        assert!(server.subscriptions(id).is_empty());
        assert!(server.inner.membership.members_of("news").is_empty());
    }

    #[test]
    fn subscribe_from_a_live_connection_joins_existing_channels() {
        let server = IpcServer::new(
            ServerOptions {
                socket_root: PathBuf::from("/tmp"),
                ..ServerOptions::default()
            },
            Arc::new(NoRoutes),
        )
        .unwrap();
        server.create_channels(["news"]).unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let id = server.register_connection(tx);

        server.subscribe(id, channels_request(&["news", "sports"]));
        assert_eq!(server.subscriptions(id), vec!["news"]);
        assert!(rx.try_recv().is_ok());
    }
}
