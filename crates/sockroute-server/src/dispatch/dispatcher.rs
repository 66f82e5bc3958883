//! Handler-chain executor.
//!
//! A request walks an ordered list of route groups (app-level, `use`, `all`,
//! verb-specific). Inside a group routes are tried in insertion order; the
//! first match runs its general handlers one by one through [`Next`]. A route
//! whose handlers all call `next()` falls through to the next matching route.
//! Failures fork into the matched route's error handlers and end in the
//! default error response.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::json;

use sockroute_core::error::{ErrorCode, IpcError, Result};

use crate::dispatch::handler::{Ctx, ErrorHandler, Handler};
use crate::dispatch::request::Request;
use crate::dispatch::response::{Response, SendOptions};
use crate::router::Route;

/// Routes of one request, snapshotted at dispatch time.
pub(crate) struct Walk {
    groups: Vec<Vec<Arc<Route>>>,
    req: Request,
    res: Response,
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    group: usize,
    route: usize,
    handler: usize,
}

impl Walk {
    fn route(&self, cursor: Cursor) -> Option<&Arc<Route>> {
        self.groups.get(cursor.group)?.get(cursor.route)
    }
}

#[derive(Clone)]
enum Continuation {
    General,
    Error(IpcError),
}

/// Continuation handed to every handler invocation.
///
/// Callable at most once; the second call fails with `NEXT_ALREADY_CALLED`.
pub struct Next {
    walk: Arc<Walk>,
    req: Arc<Request>,
    cursor: Cursor,
    cont: Continuation,
    called: Arc<AtomicBool>,
}

impl Next {
    fn claim(&self) -> Result<()> {
        if self.called.swap(true, Ordering::AcqRel) {
            return Err(IpcError::usage(
                ErrorCode::NextAlreadyCalled,
                "\"next\" cannot be called twice from a handler.",
            ));
        }
        Ok(())
    }

    /// Continue with the next handler (or, in an error handler, pass the
    /// current error on unchanged).
    pub async fn call(&self) -> Result<()> {
        self.claim()?;
        let walk = Arc::clone(&self.walk);
        let req = Arc::clone(&self.req);
        match &self.cont {
            Continuation::General => run_general(walk, req, self.cursor).await,
            Continuation::Error(error) => run_error(walk, req, self.cursor, error.clone()).await,
        }
    }

    /// Hand `error` to the route's error handlers. Inside an error handler,
    /// replaces the error seen by the next one.
    pub async fn fail(&self, error: IpcError) -> Result<()> {
        self.claim()?;
        let walk = Arc::clone(&self.walk);
        let req = Arc::clone(&self.req);
        match &self.cont {
            Continuation::General => {
                let cursor = Cursor {
                    handler: 0,
                    ..self.cursor
                };
                run_error(walk, req, cursor, error).await
            }
            Continuation::Error(_) => run_error(walk, req, self.cursor, error).await,
        }
    }
}

/// Run one request through the given route groups.
pub(crate) async fn dispatch(groups: Vec<Vec<Arc<Route>>>, req: Request, res: Response) -> Result<()> {
    let walk = Arc::new(Walk { groups, req, res });
    find_route(walk, 0, 0).await
}

/// Search for the next matching route starting at `(group, route)`.
fn find_route(walk: Arc<Walk>, group: usize, route: usize) -> BoxFuture<'static, Result<()>> {
    async move {
        let mut cursor = Cursor {
            group,
            route,
            handler: 0,
        };

        while cursor.group < walk.groups.len() {
            while let Some(candidate) = walk.route(cursor) {
                if let Some(m) = candidate.matcher.matches(walk.req.url()) {
                    tracing::trace!(pattern = candidate.matcher.pattern(), url = walk.req.url(), "route matched");
                    let req = Arc::new(walk.req.with_match(m));
                    return run_general(Arc::clone(&walk), req, cursor).await;
                }
                cursor.route += 1;
            }
            cursor.group += 1;
            cursor.route = 0;
        }

        not_found(&walk)
    }
    .boxed()
}

fn run_general(walk: Arc<Walk>, req: Arc<Request>, cursor: Cursor) -> BoxFuture<'static, Result<()>> {
    async move {
        let Some(route) = walk.route(cursor).cloned() else {
            return not_found(&walk);
        };
        let Some(handler) = route.general.get(cursor.handler).cloned() else {
            return find_route(walk, cursor.group, cursor.route + 1).await;
        };

        let called = Arc::new(AtomicBool::new(false));
        let ctx = Ctx {
            req: Arc::clone(&req),
            res: walk.res.clone(),
            next: Next {
                walk: Arc::clone(&walk),
                req: Arc::clone(&req),
                cursor: Cursor {
                    handler: cursor.handler + 1,
                    ..cursor
                },
                cont: Continuation::General,
                called: Arc::clone(&called),
            },
        };

        match guarded(handler.call(ctx)).await {
            Ok(()) => Ok(()),
            Err(e) if called.load(Ordering::Acquire) => Err(e),
            Err(e) => {
                let cursor = Cursor { handler: 0, ..cursor };
                run_error(walk, req, cursor, e).await
            }
        }
    }
    .boxed()
}

fn run_error(walk: Arc<Walk>, req: Arc<Request>, cursor: Cursor, error: IpcError) -> BoxFuture<'static, Result<()>> {
    async move {
        let handler = walk
            .route(cursor)
            .and_then(|route| route.errors.get(cursor.handler).cloned());
        let Some(handler) = handler else {
            return default_error(&walk, &error);
        };

        let called = Arc::new(AtomicBool::new(false));
        let next_cursor = Cursor {
            handler: cursor.handler + 1,
            ..cursor
        };
        let ctx = Ctx {
            req: Arc::clone(&req),
            res: walk.res.clone(),
            next: Next {
                walk: Arc::clone(&walk),
                req: Arc::clone(&req),
                cursor: next_cursor,
                cont: Continuation::Error(error.clone()),
                called: Arc::clone(&called),
            },
        };

        match guarded(handler.call(error, ctx)).await {
            Ok(()) => Ok(()),
            Err(e) if called.load(Ordering::Acquire) => Err(e),
            // A failing error handler hands its own error down the chain.
            Err(e) => run_error(walk, req, next_cursor, e).await,
        }
    }
    .boxed()
}

/// Await a handler future, turning a panic into a handler error.
async fn guarded<F>(fut: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>> + Send,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(IpcError::handler(
            ErrorCode::InternalServerError.as_str(),
            "handler panicked",
        )),
    }
}

fn not_found(walk: &Walk) -> Result<()> {
    if walk.res.is_sent() {
        tracing::warn!(url = walk.req.url(), "no route answered but a response was already sent");
        return Ok(());
    }

    tracing::debug!(request_id = walk.req.id(), url = walk.req.url(), "no request handler found");
    walk.res.send_with(
        json!({
            "code": ErrorCode::NotFound.as_str(),
            "message": format!("No request handler found for the url: {:?}", walk.req.url()),
        }),
        SendOptions {
            is_error: true,
            ..SendOptions::default()
        },
    )
}

fn default_error(walk: &Walk, error: &IpcError) -> Result<()> {
    tracing::error!(request_id = walk.req.id(), url = walk.req.url(), code = error.code(), error = %error, "unhandled handler error");

    if walk.res.is_sent() {
        return Ok(());
    }

    walk.res.send_with(
        json!({
            "code": ErrorCode::InternalServerError.as_str(),
            "message": "Internal server error.",
        }),
        SendOptions {
            is_error: true,
            ..SendOptions::default()
        },
    )
}
