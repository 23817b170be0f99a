// ABOUTME: Type-erased, cloneable middleware that can wrap one route or an entire router.
// ABOUTME: Lets controllers and builders hold heterogeneous tower layers in ordered lists.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use axum::Router;
use axum::extract::Request;
use axum::response::IntoResponse;
use axum::routing::{MethodRouter, Route};
use tower::{Layer, Service};

type WrapRoute = dyn Fn(MethodRouter) -> MethodRouter + Send + Sync;
type WrapRouter = dyn Fn(Router) -> Router + Send + Sync;

/// A request-processing wrapper composed around handlers.
///
/// Built from any tower [`Layer`] that Axum accepts, e.g.
/// `Middleware::layer(axum::middleware::from_fn(require_login))`.
/// In a list of middlewares the first one is the outermost.
#[derive(Clone)]
pub struct Middleware {
    name: Arc<str>,
    route: Arc<WrapRoute>,
    router: Arc<WrapRouter>,
}

impl Middleware {
    pub fn layer<L>(layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request, Error = Infallible> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        let for_router = layer.clone();
        Self {
            name: Arc::from(std::any::type_name::<L>()),
            route: Arc::new(move |route: MethodRouter| -> MethodRouter { route.layer(layer.clone()) }),
            router: Arc::new(move |router: Router| -> Router { router.layer(for_router.clone()) }),
        }
    }

    /// Give the middleware a readable name for logs and `Debug` output.
    pub fn named(mut self, name: &str) -> Self {
        self.name = Arc::from(name);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn wrap_route(&self, route: MethodRouter) -> MethodRouter {
        (self.route)(route)
    }

    pub(crate) fn wrap_router(&self, router: Router) -> Router {
        (self.router)(router)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Middleware").field(&self.name).finish()
    }
}

/// Wrap a route so that `middlewares[0]` ends up outermost.
pub(crate) fn wrap_route_all(route: MethodRouter, middlewares: &[Middleware]) -> MethodRouter {
    middlewares
        .iter()
        .rev()
        .fold(route, |route, mw| mw.wrap_route(route))
}

/// Wrap a router so that `middlewares[0]` ends up outermost.
pub(crate) fn wrap_router_all(router: Router, middlewares: &[Middleware]) -> Router {
    middlewares
        .iter()
        .rev()
        .fold(router, |router, mw| mw.wrap_router(router))
}
