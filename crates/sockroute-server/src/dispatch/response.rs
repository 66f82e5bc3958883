use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{Map, Value};

use sockroute_core::error::{ErrorCode, IpcError, Result};
use sockroute_core::protocol::{GeneralResponsePayload, RequestMetadata, SocketResponse};

use crate::ipc::{ConnectionId, IpcServer};

/// Where responses are written. Implemented by [`IpcServer`]; tests plug in
/// a recorder.
pub trait ResponseSink: Send + Sync {
    fn send_response(&self, connection_id: ConnectionId, response: SocketResponse, end_connection: bool) -> Result<()>;
}

impl ResponseSink for IpcServer {
    fn send_response(&self, connection_id: ConnectionId, response: SocketResponse, end_connection: bool) -> Result<()> {
        self.queue_response(connection_id, &response, end_connection)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub is_error: bool,
    /// Half-close the connection once the response is written.
    pub end_connection: bool,
    pub headers: Map<String, Value>,
}

/// One-shot response bound to a single request.
///
/// Clones share the same guard: whichever clone sends first wins, every
/// later attempt fails with `RESPONSE_ALREADY_SENT`.
#[derive(Clone)]
pub struct Response {
    inner: Arc<ResponseInner>,
}

struct ResponseInner {
    sink: Arc<dyn ResponseSink>,
    connection_id: ConnectionId,
    metadata: RequestMetadata,
    sent: AtomicBool,
}

impl Response {
    pub fn new(sink: Arc<dyn ResponseSink>, connection_id: ConnectionId, metadata: RequestMetadata) -> Self {
        Self {
            inner: Arc::new(ResponseInner {
                sink,
                connection_id,
                metadata,
                sent: AtomicBool::new(false),
            }),
        }
    }

    pub fn send(&self, body: Value) -> Result<()> {
        self.send_with(body, SendOptions::default())
    }

    pub fn send_with(&self, body: Value, options: SendOptions) -> Result<()> {
        if self
            .inner
            .sent
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(IpcError::usage(
                ErrorCode::ResponseAlreadySent,
                "The response is already sent.",
            ));
        }

        let response = SocketResponse::reply(
            &self.inner.metadata,
            options.is_error,
            GeneralResponsePayload {
                headers: options.headers,
                body,
            },
        );

        let sent = self
            .inner
            .sink
            .send_response(self.inner.connection_id, response, options.end_connection);
        if sent.is_err() {
            self.inner.sent.store(false, Ordering::Release);
        }
        sent
    }

    /// Send an error-flagged response with body `{code, message}`.
    pub fn send_error(&self, error: &IpcError) -> Result<()> {
        let body = serde_json::to_value(error.to_body()).unwrap_or(Value::Null);
        self.send_with(
            body,
            SendOptions {
                is_error: true,
                ..SendOptions::default()
            },
        )
    }

    pub fn is_sent(&self) -> bool {
        self.inner.sent.load(Ordering::Acquire)
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.inner.connection_id
    }
}
