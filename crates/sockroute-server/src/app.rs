//! Application facade: route registration on top of an [`IpcServer`].
//!
//! `App` owns the router and the server it is plugged into. Routes may be
//! registered before or after `listen`; requests already in flight keep the
//! handler lists they started with.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;

use sockroute_core::address::SocketAddress;
use sockroute_core::error::Result;

use crate::config::ServerConfig;
use crate::dispatch::IntoHandlers;
use crate::ipc::{Broadcast, IpcServer, ListenOptions, ServerEvent, ServerOptions};
use crate::router::{Router, VerbGroup};

#[derive(Clone)]
pub struct App {
    router: Arc<Router>,
    server: IpcServer,
}

impl App {
    pub fn new(options: ServerOptions) -> Result<Self> {
        let router = Arc::new(Router::new());
        let server = IpcServer::new(options, router.clone())?;
        Ok(Self { router, server })
    }

    /// Build from a validated config, creating its channels.
    pub fn from_config(cfg: &ServerConfig) -> Result<Self> {
        let app = Self::new(cfg.server.server_options())?;
        if !cfg.server.channels.is_empty() {
            app.create_channels(cfg.server.channels.iter().cloned())?;
        }
        Ok(app)
    }

    pub fn server(&self) -> &IpcServer {
        &self.server
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn get(&self, path: &str, handlers: impl IntoHandlers) -> Result<()> {
        self.router.registrar().register(VerbGroup::Get, path, handlers)
    }

    pub fn post(&self, path: &str, handlers: impl IntoHandlers) -> Result<()> {
        self.router.registrar().register(VerbGroup::Post, path, handlers)
    }

    pub fn patch(&self, path: &str, handlers: impl IntoHandlers) -> Result<()> {
        self.router.registrar().register(VerbGroup::Patch, path, handlers)
    }

    pub fn delete(&self, path: &str, handlers: impl IntoHandlers) -> Result<()> {
        self.router.registrar().register(VerbGroup::Delete, path, handlers)
    }

    /// Any method, exact path.
    pub fn all(&self, path: &str, handlers: impl IntoHandlers) -> Result<()> {
        self.router.registrar().register(VerbGroup::All, path, handlers)
    }

    /// App-level middleware: runs first, for every request.
    pub fn middleware(&self, handlers: impl IntoHandlers) -> Result<()> {
        self.router.registrar().register(VerbGroup::App, "/", handlers)
    }

    /// Middleware for every url under `path`.
    pub fn use_at(&self, path: &str, handlers: impl IntoHandlers) -> Result<()> {
        self.router.registrar().register(VerbGroup::Use, path, handlers)
    }

    pub async fn listen(&self, address: &SocketAddress, options: ListenOptions) -> Result<PathBuf> {
        self.server.listen(address, options).await
    }

    pub fn close(&self) {
        self.server.close();
    }

    pub fn socket_path(&self) -> Option<PathBuf> {
        self.server.socket_path()
    }

    pub fn events(&self) -> broadcast::Receiver<ServerEvent> {
        self.server.events()
    }

    pub fn broadcast(&self, broadcast: Broadcast) -> Result<usize> {
        self.server.broadcast(broadcast)
    }

    pub fn create_channels<I, S>(&self, channels: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.server.create_channels(channels)
    }

    pub fn delete_channels<I, S>(&self, channels: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.server.delete_channels(channels)
    }
}
