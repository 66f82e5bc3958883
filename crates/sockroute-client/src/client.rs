use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, oneshot};

use sockroute_core::error::{ErrorCode, IpcError, Result};
use sockroute_core::protocol::{
    normalize_channels, Category, ChannelsPayload, ChannelsRequest, Delimiter, GeneralRequest,
    GeneralRequestPayload, GeneralResponsePayload, Method, RequestMetadata, SocketRequest,
};

use crate::connection::{self, Query, Shared};
use crate::types::{ClientEvent, ClientOptions, RequestOptions};

/// IPC client over a single socket connection.
///
/// Requests are written in call order and resolved by id. Once the socket
/// ends, fails, or [`IpcClient::close`] is called, every outstanding request
/// is rejected and new ones fail immediately; build a new client to
/// reconnect. Dropping the client closes it.
pub struct IpcClient {
    shared: Arc<Shared>,
}

impl IpcClient {
    /// Validate options and start connecting in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let delimiter = Delimiter::parse(&options.delimiter)?;
        let socket_path = options.address.resolve(&options.socket_root)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            IpcError::usage(ErrorCode::SocketError, format!("no tokio runtime: {e}"))
        })?;

        let shared = Arc::new(Shared::new(delimiter));
        runtime.spawn(connection::run(Arc::clone(&shared), socket_path));
        Ok(Self { shared })
    }

    /// Broadcasts, decode errors, unhandled responses and socket errors.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.shared.subscribe_events()
    }

    pub async fn get(&self, url: impl Into<String>, options: RequestOptions) -> Result<GeneralResponsePayload> {
        self.request(url, Method::Get, options).await
    }

    pub async fn post(&self, url: impl Into<String>, options: RequestOptions) -> Result<GeneralResponsePayload> {
        self.request(url, Method::Post, options).await
    }

    pub async fn patch(&self, url: impl Into<String>, options: RequestOptions) -> Result<GeneralResponsePayload> {
        self.request(url, Method::Patch, options).await
    }

    pub async fn delete(&self, url: impl Into<String>, options: RequestOptions) -> Result<GeneralResponsePayload> {
        self.request(url, Method::Delete, options).await
    }

    pub async fn request(
        &self,
        url: impl Into<String>,
        method: Method,
        options: RequestOptions,
    ) -> Result<GeneralResponsePayload> {
        let id = self.shared.next_id();
        let request = SocketRequest::General(GeneralRequest {
            metadata: RequestMetadata {
                id: id.clone(),
                category: Category::General,
            },
            payload: GeneralRequestPayload {
                url: url.into(),
                method,
                query: options.query,
                headers: options.headers,
                body: options.body,
            },
        });
        self.submit(id, request, options.timeout).await
    }

    pub async fn subscribe<I, S>(&self, channels: I) -> Result<GeneralResponsePayload>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels_request(Category::Subscribe, channels).await
    }

    pub async fn unsubscribe<I, S>(&self, channels: I) -> Result<GeneralResponsePayload>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels_request(Category::Unsubscribe, channels).await
    }

    async fn channels_request<I, S>(&self, category: Category, channels: I) -> Result<GeneralResponsePayload>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channels = normalize_channels(channels)?;
        let id = self.shared.next_id();
        let request = ChannelsRequest {
            metadata: RequestMetadata {
                id: id.clone(),
                category,
            },
            payload: ChannelsPayload { channels },
        };
        let request = match category {
            Category::Unsubscribe => SocketRequest::Unsubscribe(request),
            _ => SocketRequest::Subscribe(request),
        };
        self.submit(id, request, None).await
    }

    async fn submit(&self, id: String, request: SocketRequest, timeout: Option<Duration>) -> Result<GeneralResponsePayload> {
        let (tx, rx) = oneshot::channel();
        let query = Query {
            id,
            request,
            timeout,
            tx,
        };
        if let Err((_query, err)) = self.shared.enqueue(query) {
            return Err(err);
        }

        rx.await.unwrap_or_else(|_| {
            Err(IpcError::transport(
                ErrorCode::SocketError,
                "the connection task stopped",
            ))
        })
    }

    /// Destroy the socket and reject every outstanding request with
    /// `SOCKET_DESTROYED_MANUALLY`. Idempotent.
    pub fn close(&self) {
        self.shared.terminate(IpcError::transport(
            ErrorCode::SocketDestroyedManually,
            "the socket was destroyed manually",
        ));
    }

    /// Terminal error, once the client can no longer be used.
    pub fn terminal_error(&self) -> Option<IpcError> {
        self.shared.terminal()
    }
}

impl Drop for IpcClient {
    fn drop(&mut self) {
        self.close();
    }
}
