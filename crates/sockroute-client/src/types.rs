use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Map, Value};

use sockroute_core::address::{self, SocketAddress};
use sockroute_core::error::IpcError;
use sockroute_core::protocol::{CorrelatedResponse, DEFAULT_DELIMITER};

/// Client construction options.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Single-character message delimiter; must match the server's.
    pub delimiter: String,
    /// Directory `{namespace, id}` addresses are resolved against.
    pub socket_root: PathBuf,
    pub address: SocketAddress,
}

impl ClientOptions {
    pub fn new(address: impl Into<SocketAddress>) -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            socket_root: address::default_socket_root(),
            address: address.into(),
        }
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn socket_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.socket_root = root.into();
        self
    }
}

/// Per-request options. Missing maps default to `{}`, a missing body to `null`.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Map<String, Value>,
    pub headers: Map<String, Value>,
    pub body: Value,
    /// Reject with `REQUEST_TIMEOUT` if no response arrives in time, counted
    /// from when the request was written.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Things the client observes outside of request/response pairs.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A message published on a subscribed channel.
    Broadcast { channel: String, data: Value },
    /// An inbound frame could not be decoded (`INVALID_RESPONSE:NOT_JSON`).
    Error(IpcError),
    /// A response for an id nobody waits on, e.g. one that already timed out
    /// (`INVALID_RESPONSE:UNKNOWN_ID`).
    UnhandledResponse {
        response: CorrelatedResponse,
        error: IpcError,
    },
    /// The socket failed; every pending request has been rejected.
    SocketError(IpcError),
}
