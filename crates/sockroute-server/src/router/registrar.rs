use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use sockroute_core::error::{ErrorCode, IpcError, Result};
use sockroute_core::protocol::Method;

use crate::dispatch::handler::{collect_handlers, ErrorHandler, Handler, IntoHandlers, Middleware};
use crate::router::matcher::{MatchMode, PathMatcher};

/// Registration bucket. Dispatch walks `App`, `Use`, `All`, then the
/// request's verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerbGroup {
    App,
    Use,
    All,
    Get,
    Post,
    Patch,
    Delete,
}

impl VerbGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            VerbGroup::App => "app",
            VerbGroup::Use => "use",
            VerbGroup::All => "all",
            VerbGroup::Get => "get",
            VerbGroup::Post => "post",
            VerbGroup::Patch => "patch",
            VerbGroup::Delete => "delete",
        }
    }

    fn match_mode(self) -> MatchMode {
        match self {
            VerbGroup::App => MatchMode::Always,
            VerbGroup::Use => MatchMode::Prefix,
            _ => MatchMode::Exact,
        }
    }
}

impl From<Method> for VerbGroup {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => VerbGroup::Get,
            Method::Post => VerbGroup::Post,
            Method::Patch => VerbGroup::Patch,
            Method::Delete => VerbGroup::Delete,
        }
    }
}

/// A `(group, path)` binding with its handlers split by kind.
#[derive(Clone)]
pub struct Route {
    pub(crate) matcher: PathMatcher,
    pub(crate) general: Vec<Arc<dyn Handler>>,
    pub(crate) errors: Vec<Arc<dyn ErrorHandler>>,
}

impl Route {
    fn new(pattern: &str, mode: MatchMode) -> Self {
        Self {
            matcher: PathMatcher::new(pattern, mode),
            general: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn push(&mut self, handlers: Vec<Middleware>) {
        for h in handlers {
            match h {
                Middleware::General(h) => self.general.push(h),
                Middleware::Error(h) => self.errors.push(h),
            }
        }
    }

    pub fn pattern(&self) -> &str {
        self.matcher.pattern()
    }

    pub fn general_len(&self) -> usize {
        self.general.len()
    }

    pub fn error_len(&self) -> usize {
        self.errors.len()
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern())
            .field("general", &self.general.len())
            .field("errors", &self.errors.len())
            .finish()
    }
}

#[derive(Default)]
struct RouteGroup {
    routes: Vec<Arc<Route>>,
    by_path: HashMap<String, usize>,
}

/// Registry of routes per verb group.
///
/// Routes are created on first registration of a `(group, path)` pair and
/// appended to afterwards. Appends are copy-on-write, so a request already
/// being dispatched keeps the handler lists it started with.
#[derive(Default)]
pub struct Registrar {
    groups: DashMap<VerbGroup, RouteGroup>,
}

impl Registrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, group: VerbGroup, path: &str, handlers: impl IntoHandlers) -> Result<()> {
        if path.is_empty() {
            return Err(IpcError::usage(ErrorCode::InvalidPath, "path must be a non-empty string"));
        }
        let handlers = collect_handlers(handlers)?;

        // The app-level route is a single catch-all.
        let key = if group == VerbGroup::App { "/" } else { path };

        let mut entry = self.groups.entry(group).or_default();
        let rg = entry.value_mut();
        match rg.by_path.get(key) {
            Some(&idx) => Arc::make_mut(&mut rg.routes[idx]).push(handlers),
            None => {
                let mut route = Route::new(key, group.match_mode());
                route.push(handlers);
                rg.by_path.insert(key.to_owned(), rg.routes.len());
                rg.routes.push(Arc::new(route));
            }
        }

        tracing::debug!(group = group.as_str(), path = key, "route registered");
        Ok(())
    }

    pub fn routes(&self, group: VerbGroup) -> Vec<Arc<Route>> {
        self.groups
            .get(&group)
            .map(|g| g.routes.clone())
            .unwrap_or_default()
    }

    /// Ordered route groups for a request with `method`.
    pub fn snapshot(&self, method: Method) -> Vec<Vec<Arc<Route>>> {
        [VerbGroup::App, VerbGroup::Use, VerbGroup::All, method.into()]
            .into_iter()
            .map(|g| self.routes(g))
            .collect()
    }
}
