//! Routing: path matching and route registration, plus the glue that feeds
//! validated `general` requests from the IPC server into the dispatcher.

pub mod matcher;
pub mod registrar;

use std::sync::Arc;

use async_trait::async_trait;

use sockroute_core::error::Result;
use sockroute_core::protocol::GeneralRequest;

use crate::dispatch::dispatcher;
use crate::dispatch::{Request, Response, ResponseSink};
use crate::ipc::{ConnectionId, IpcServer, RequestHandler};

pub use matcher::{MatchMode, PathMatch, PathMatcher};
pub use registrar::{Registrar, Route, VerbGroup};

/// Route registry that dispatches incoming requests.
#[derive(Default)]
pub struct Router {
    registrar: Registrar,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registrar(&self) -> &Registrar {
        &self.registrar
    }

    /// Run one request through the handler chain, answering through `sink`.
    ///
    /// Errors that escape the chain are returned: handler bugs (double
    /// `next`, double send) and errors raised after `next` already ran.
    pub async fn dispatch(
        &self,
        sink: Arc<dyn ResponseSink>,
        connection_id: ConnectionId,
        request: GeneralRequest,
    ) -> Result<()> {
        let method = request.payload.method;
        let res = Response::new(sink, connection_id, request.metadata.clone());
        let req = Request::new(connection_id, request);
        let groups = self.registrar.snapshot(method);
        dispatcher::dispatch(groups, req, res).await
    }
}

#[async_trait]
impl RequestHandler for Router {
    async fn handle(&self, server: IpcServer, connection_id: ConnectionId, request: GeneralRequest) {
        let request_id = request.metadata.id.clone();
        if let Err(e) = self.dispatch(Arc::new(server), connection_id, request).await {
            tracing::error!(connection_id, request_id = %request_id, code = e.code(), error = %e, "request dispatch failed");
        }
    }
}
