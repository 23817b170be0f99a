// ABOUTME: Top-level route table builder: registers controllers, static mounts, and views.
// ABOUTME: Produces an Axum Router with global middleware and a single error-dispatch entry point.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::handler::HandlerWithoutStateExt;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use axum::routing::MethodRouter;
use serde_json::Value;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;

use corral_core::{Failure, HttpError, Method, join, normalize};

use crate::context::RequestContext;
use crate::controller::Controller;
use crate::dispatch::{DispatchLayer, ErrorDispatcher};
use crate::middleware::{Middleware, wrap_route_all, wrap_router_all};
use crate::views::{ViewError, Views};

/// One route in the builder's table.
#[derive(Clone)]
pub struct RouteEntry {
    method: Method,
    path: String,
    route: MethodRouter,
}

impl RouteEntry {
    pub fn method(&self) -> Method {
        self.method
    }

    /// Full normalized path: `normalize(base) + normalize(sub)`.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

#[derive(Debug, Clone)]
struct StaticMount {
    prefix: String,
    dir: PathBuf,
}

/// Accumulates controllers, static mounts, views, and error handlers, and
/// builds them into an `axum::Router`.
///
/// `build` can be called any number of times; each call assembles a router
/// from everything registered so far.
#[derive(Debug)]
pub struct RouteBuilder {
    middlewares: Vec<Middleware>,
    routes: Vec<RouteEntry>,
    statics: Vec<StaticMount>,
    views: Option<Views>,
    dispatcher: ErrorDispatcher,
}

impl RouteBuilder {
    pub fn new() -> Self {
        Self::with_middleware(Vec::new())
    }

    /// Create a builder whose middlewares wrap every route, static mount,
    /// and fallback. The first middleware is the outermost.
    pub fn with_middleware<I>(middlewares: I) -> Self
    where
        I: IntoIterator<Item = Middleware>,
    {
        Self {
            middlewares: middlewares.into_iter().collect(),
            routes: Vec::new(),
            statics: Vec::new(),
            views: None,
            dispatcher: ErrorDispatcher::new(),
        }
    }

    /// Add every endpoint of `controller` under its base path. Group
    /// middlewares wrap endpoint middlewares, which wrap the handler.
    pub fn register(&mut self, controller: &Controller) -> &mut Self {
        for endpoint in controller.endpoints() {
            let route = wrap_route_all(endpoint.route().clone(), endpoint.middlewares());
            let route = wrap_route_all(route, controller.middlewares());
            let path = join(controller.base_path(), endpoint.path());

            tracing::debug!(method = %endpoint.method(), path = %path, "route registered");
            self.routes.push(RouteEntry {
                method: endpoint.method(),
                path,
                route,
            });
        }
        self
    }

    /// Serve files from `dir` under `prefix`.
    pub fn register_static(&mut self, prefix: &str, dir: impl AsRef<Path>) -> &mut Self {
        let mount = StaticMount {
            prefix: normalize(prefix),
            dir: dir.as_ref().to_path_buf(),
        };
        tracing::debug!(prefix = %mount.prefix, dir = %mount.dir.display(), "static mount registered");
        self.statics.push(mount);
        self
    }

    /// Load every template under `base` ending in `ext`. Any failure here
    /// is a startup error and must not be ignored.
    pub fn register_views(&mut self, base: impl AsRef<Path>, ext: &str) -> Result<&mut Self, ViewError> {
        self.views = Some(Views::load(base, ext)?);
        Ok(self)
    }

    /// Install an error handler for an arbitrary status code.
    pub fn error_handler<F>(&mut self, status: StatusCode, handler: F) -> &mut Self
    where
        F: Fn(&Failure, &RequestContext) -> axum::response::Response + Send + Sync + 'static,
    {
        self.dispatcher.add_handler(status, Arc::new(handler));
        self
    }

    /// Install an error view for an arbitrary status code: `template` is
    /// rendered with `data` and sent with `status`.
    pub fn error_view(&mut self, status: StatusCode, template: &str, data: Value) -> &mut Self {
        let template = template.to_string();
        self.error_handler(status, move |_, ctx| match ctx.render(status, &template, &data) {
            Ok(resp) => resp,
            Err(err) => {
                tracing::error!(template = %template, error = %err, "failed to render error view");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        })
    }

    pub fn not_found_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Failure, &RequestContext) -> axum::response::Response + Send + Sync + 'static,
    {
        self.error_handler(StatusCode::NOT_FOUND, handler)
    }

    pub fn not_found_view(&mut self, template: &str, data: Value) -> &mut Self {
        self.error_view(StatusCode::NOT_FOUND, template, data)
    }

    pub fn unauthorized_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Failure, &RequestContext) -> axum::response::Response + Send + Sync + 'static,
    {
        self.error_handler(StatusCode::UNAUTHORIZED, handler)
    }

    pub fn unauthorized_view(&mut self, template: &str, data: Value) -> &mut Self {
        self.error_view(StatusCode::UNAUTHORIZED, template, data)
    }

    pub fn forbidden_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Failure, &RequestContext) -> axum::response::Response + Send + Sync + 'static,
    {
        self.error_handler(StatusCode::FORBIDDEN, handler)
    }

    pub fn forbidden_view(&mut self, template: &str, data: Value) -> &mut Self {
        self.error_view(StatusCode::FORBIDDEN, template, data)
    }

    pub fn internal_server_error_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Failure, &RequestContext) -> axum::response::Response + Send + Sync + 'static,
    {
        self.error_handler(StatusCode::INTERNAL_SERVER_ERROR, handler)
    }

    pub fn internal_server_error_view(&mut self, template: &str, data: Value) -> &mut Self {
        self.error_view(StatusCode::INTERNAL_SERVER_ERROR, template, data)
    }

    /// Registered routes in registration order, duplicates included.
    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    pub fn dispatcher(&self) -> &ErrorDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut ErrorDispatcher {
        &mut self.dispatcher
    }

    pub fn views(&self) -> Option<&Views> {
        self.views.as_ref()
    }

    /// Assemble the router.
    ///
    /// Layering, outermost first: error dispatch, panic recovery, global
    /// middlewares, then the routes, static mounts, and fallbacks. A static
    /// mount whose prefix was already mounted, or that overlaps a route, is
    /// skipped with a warning.
    pub fn build(&self) -> Router {
        let table = self.route_table();
        let mut mounted: Vec<&str> = Vec::new();
        let mut router = Router::new();
        for (path, route) in &table {
            router = router.route(path, route.clone());
        }

        router = router
            .fallback(not_found)
            .method_not_allowed_fallback(method_not_allowed);

        for mount in &self.statics {
            let prefix = mount.prefix.as_str();
            if mounted.contains(&prefix) {
                tracing::warn!(prefix = %prefix, dir = %mount.dir.display(), "static prefix mounted twice; keeping the first mount");
                continue;
            }
            if let Some((path, _)) = table.iter().find(|(path, _)| overlaps_mount(path, prefix)) {
                tracing::warn!(prefix = %prefix, route = %path, "static prefix collides with a route; skipping mount");
                continue;
            }
            mounted.push(prefix);

            let files = ServeDir::new(&mount.dir).not_found_service(not_found.into_service());
            router = if prefix.is_empty() {
                router.fallback_service(files)
            } else {
                router.nest_service(prefix, files)
            };
        }

        wrap_router_all(router, &self.middlewares)
            .layer(CatchPanicLayer::custom(panic_to_failure))
            .layer(DispatchLayer::new(self.dispatcher.clone(), self.views.clone()))
    }

    /// Group routes by engine path, keeping first-seen path order. A later
    /// registration of the same method and path replaces the earlier one.
    fn route_table(&self) -> Vec<(String, MethodRouter)> {
        let mut table: Vec<(String, Vec<&RouteEntry>)> = Vec::new();

        for entry in &self.routes {
            let path = engine_path(&entry.path);
            let idx = match table.iter().position(|(p, _)| *p == path) {
                Some(idx) => idx,
                None => {
                    table.push((path.clone(), Vec::new()));
                    table.len() - 1
                }
            };

            let methods = &mut table[idx].1;
            match methods.iter_mut().find(|e| e.method == entry.method) {
                Some(existing) => {
                    tracing::warn!(method = %entry.method, path = %path, "route registered twice; last registration wins");
                    *existing = entry;
                }
                None => methods.push(entry),
            }
        }

        table
            .into_iter()
            .map(|(path, entries)| {
                let route = entries
                    .into_iter()
                    .map(|e| e.route.clone())
                    .reduce(MethodRouter::merge)
                    .unwrap_or_else(MethodRouter::new);
                (path, route)
            })
            .collect()
    }
}

impl Default for RouteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate a registered path into axum's route syntax: `""` becomes `/`,
/// `:name` segments become `{name}` and `*name` segments become `{*name}`.
fn engine_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':').filter(|n| !n.is_empty()) {
                format!("{{{}}}", name)
            } else if let Some(name) = segment.strip_prefix('*').filter(|n| !n.is_empty()) {
                format!("{{*{}}}", name)
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether a route at `path` would clash with a static mount at `prefix`.
/// A root mount is a fallback and never clashes with routes.
fn overlaps_mount(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

async fn not_found() -> Failure {
    HttpError::not_found().into()
}

async fn method_not_allowed() -> Failure {
    HttpError::method_not_allowed().into()
}

fn panic_to_failure(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    Failure::msg(format!("handler panicked: {}", detail)).into_response()
}
