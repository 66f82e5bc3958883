use std::collections::HashMap;

use serde_json::{Map, Value};

use sockroute_core::protocol::{GeneralRequest, Method};

use crate::ipc::ConnectionId;
use crate::router::PathMatch;

/// Read-only view of a `general` request as seen by handlers.
///
/// `path` and `params` are filled in by the dispatcher for the route being
/// executed; everything else comes from the wire.
#[derive(Debug, Clone)]
pub struct Request {
    connection_id: ConnectionId,
    id: String,
    url: String,
    method: Method,
    query: Map<String, Value>,
    headers: Map<String, Value>,
    body: Value,
    path: String,
    params: HashMap<String, String>,
}

impl Request {
    pub fn new(connection_id: ConnectionId, request: GeneralRequest) -> Self {
        let payload = request.payload;
        Self {
            connection_id,
            id: request.metadata.id,
            url: payload.url,
            method: payload.method,
            query: payload.query,
            headers: payload.headers,
            body: payload.body,
            path: String::new(),
            params: HashMap::new(),
        }
    }

    /// Copy of this request bound to a route match.
    pub(crate) fn with_match(&self, m: PathMatch) -> Self {
        Self {
            path: m.path,
            params: m.params,
            ..self.clone()
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Request id chosen by the client.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn query(&self) -> &Map<String, Value> {
        &self.query
    }

    pub fn headers(&self) -> &Map<String, Value> {
        &self.headers
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Portion of the url matched by the current route.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}
