use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use sockroute_core::error::{ErrorCode, IpcError, Result};

use crate::dispatch::dispatcher::Next;
use crate::dispatch::request::Request;
use crate::dispatch::response::Response;

/// Everything a handler gets for one invocation.
pub struct Ctx {
    pub req: Arc<Request>,
    pub res: Response,
    pub next: Next,
}

/// General (non-error) route handler.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, ctx: Ctx) -> Result<()>;
}

/// Error handler: runs once a general handler failed or forwarded an error.
#[async_trait]
pub trait ErrorHandler: Send + Sync + 'static {
    async fn call(&self, error: IpcError, ctx: Ctx) -> Result<()>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Ctx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn call(&self, ctx: Ctx) -> Result<()> {
        (self)(ctx).await
    }
}

#[async_trait]
impl<F, Fut> ErrorHandler for F
where
    F: Fn(IpcError, Ctx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn call(&self, error: IpcError, ctx: Ctx) -> Result<()> {
        (self)(error, ctx).await
    }
}

/// A registered handler, tagged with its kind at registration time.
#[derive(Clone)]
pub enum Middleware {
    General(Arc<dyn Handler>),
    Error(Arc<dyn ErrorHandler>),
}

impl Middleware {
    pub fn general(h: impl Handler) -> Self {
        Middleware::General(Arc::new(h))
    }

    pub fn error(h: impl ErrorHandler) -> Self {
        Middleware::Error(Arc::new(h))
    }
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Middleware::General(_) => f.write_str("Middleware::General"),
            Middleware::Error(_) => f.write_str("Middleware::Error"),
        }
    }
}

/// Wrap a closure as a general handler.
pub fn handler<F, Fut>(f: F) -> Middleware
where
    F: Fn(Ctx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Middleware::General(Arc::new(f))
}

/// Wrap a closure as an error handler.
pub fn error_handler<F, Fut>(f: F) -> Middleware
where
    F: Fn(IpcError, Ctx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Middleware::Error(Arc::new(f))
}

/// Anything that can be registered on a route: a single handler, a list, or
/// a list of lists (flattened one level).
pub trait IntoHandlers {
    fn into_handlers(self) -> Vec<Middleware>;
}

impl IntoHandlers for Middleware {
    fn into_handlers(self) -> Vec<Middleware> {
        vec![self]
    }
}

impl IntoHandlers for Vec<Middleware> {
    fn into_handlers(self) -> Vec<Middleware> {
        self
    }
}

impl<const N: usize> IntoHandlers for [Middleware; N] {
    fn into_handlers(self) -> Vec<Middleware> {
        self.into()
    }
}

impl IntoHandlers for Vec<Vec<Middleware>> {
    fn into_handlers(self) -> Vec<Middleware> {
        self.into_iter().flatten().collect()
    }
}

/// Flatten and check a handler list before it is stored.
pub(crate) fn collect_handlers(handlers: impl IntoHandlers) -> Result<Vec<Middleware>> {
    let handlers = handlers.into_handlers();
    if handlers.is_empty() {
        return Err(IpcError::usage(
            ErrorCode::InvalidRequestHandlers,
            "Request handlers must be a non-empty list of handlers",
        ));
    }
    Ok(handlers)
}
