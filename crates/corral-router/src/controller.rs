// ABOUTME: Controllers group endpoints under one base path with shared middleware.
// ABOUTME: Offers fluent per-method registration plus view-rendering and redirect helpers.

use std::fmt;
use std::sync::Arc;

use axum::extract::Request;
use axum::handler::Handler;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter, on};
use serde_json::Value;

use corral_core::{Failure, HttpError, Method};

use crate::context::RequestContext;
use crate::middleware::Middleware;

/// One registered endpoint: method, sub-path, handler, and its own middlewares.
#[derive(Clone)]
pub struct EndpointRecord {
    method: Method,
    path: String,
    route: MethodRouter,
    middlewares: Vec<Middleware>,
}

impl EndpointRecord {
    pub fn method(&self) -> Method {
        self.method
    }

    /// The sub-path exactly as given at registration.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn middlewares(&self) -> &[Middleware] {
        &self.middlewares
    }

    pub(crate) fn route(&self) -> &MethodRouter {
        &self.route
    }
}

impl fmt::Debug for EndpointRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointRecord")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("middlewares", &self.middlewares)
            .finish_non_exhaustive()
    }
}

fn method_filter(method: Method) -> MethodFilter {
    match method {
        Method::Get => MethodFilter::GET,
        Method::Post => MethodFilter::POST,
        Method::Put => MethodFilter::PUT,
        Method::Patch => MethodFilter::PATCH,
        Method::Delete => MethodFilter::DELETE,
        Method::Head => MethodFilter::HEAD,
        Method::Options => MethodFilter::OPTIONS,
    }
}

macro_rules! method_registrars {
    ($($method:ident, $method_with:ident => $variant:ident;)*) => {
        $(
            #[doc = concat!("Register a `", stringify!($variant), "` endpoint.")]
            pub fn $method<H, T>(self, path: &str, handler: H) -> Self
            where
                H: Handler<T, ()>,
                T: 'static,
            {
                self.endpoint(Method::$variant, path, handler, Vec::new())
            }

            #[doc = concat!("Register a `", stringify!($variant), "` endpoint wrapped in its own middlewares.")]
            pub fn $method_with<H, T, I>(self, path: &str, handler: H, middlewares: I) -> Self
            where
                H: Handler<T, ()>,
                T: 'static,
                I: IntoIterator<Item = Middleware>,
            {
                self.endpoint(Method::$variant, path, handler, middlewares)
            }
        )*
    };
}

/// A group of endpoints sharing a base path and a middleware list.
///
/// Registration only appends; a controller can be registered into any
/// number of builders.
#[derive(Clone)]
pub struct Controller {
    base_path: String,
    middlewares: Vec<Middleware>,
    endpoints: Vec<EndpointRecord>,
}

impl Controller {
    pub fn new(base_path: &str) -> Self {
        Self::with_middleware(base_path, Vec::new())
    }

    /// Create a controller whose middlewares wrap every endpoint in it.
    pub fn with_middleware<I>(base_path: &str, middlewares: I) -> Self
    where
        I: IntoIterator<Item = Middleware>,
    {
        Self {
            base_path: base_path.to_string(),
            middlewares: middlewares.into_iter().collect(),
            endpoints: Vec::new(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn middlewares(&self) -> &[Middleware] {
        &self.middlewares
    }

    /// Endpoints in registration order.
    pub fn endpoints(&self) -> &[EndpointRecord] {
        &self.endpoints
    }

    /// Register an endpoint for any supported method.
    pub fn endpoint<H, T, I>(mut self, method: Method, path: &str, handler: H, middlewares: I) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
        I: IntoIterator<Item = Middleware>,
    {
        self.endpoints.push(EndpointRecord {
            method,
            path: path.to_string(),
            route: on(method_filter(method), handler),
            middlewares: middlewares.into_iter().collect(),
        });
        self
    }

    method_registrars! {
        get, get_with => Get;
        post, post_with => Post;
        put, put_with => Put;
        patch, patch_with => Patch;
        delete, delete_with => Delete;
        head, head_with => Head;
        options, options_with => Options;
    }

    /// Register a GET endpoint that renders `template` with fixed data.
    pub fn view(self, path: &str, template: &str, data: Value) -> Self {
        let data = Arc::new(data);
        self.view_with(path, template, move |_: &RequestContext| Ok(Value::clone(&data)))
    }

    /// Register a GET endpoint that renders `template` with data computed
    /// from each request.
    pub fn view_with<F>(self, path: &str, template: &str, data: F) -> Self
    where
        F: Fn(&RequestContext) -> Result<Value, Failure> + Clone + Send + Sync + 'static,
    {
        let template: Arc<str> = Arc::from(template);
        let handler = move |req: Request| {
            let template = Arc::clone(&template);
            let data = data.clone();
            async move {
                let ctx = RequestContext::from_request(&req);
                data(&ctx).and_then(|data| ctx.render_html(&template, &data))
            }
        };
        self.endpoint(Method::Get, path, handler, Vec::new())
    }

    /// Register an endpoint that redirects to `target` with `status`.
    pub fn redirect(self, method: Method, path: &str, target: &str, status: StatusCode) -> Self {
        let target: Arc<str> = Arc::from(target);
        let handler = move || {
            let target = Arc::clone(&target);
            async move { redirect_response(status, &target) }
        };
        self.endpoint(method, path, handler, Vec::new())
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("base_path", &self.base_path)
            .field("middlewares", &self.middlewares)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

fn redirect_response(status: StatusCode, target: &str) -> Result<Response, Failure> {
    if !status.is_redirection() {
        return Err(HttpError::internal("invalid redirect status code").into());
    }
    let location = HeaderValue::from_str(target)?;
    Ok((status, [(header::LOCATION, location)]).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::testing;
    use axum::Router;
    use axum::body::Body;
    use tower::ServiceExt;

    async fn ok() -> &'static str {
        "ok"
    }

    fn single_route(record: &EndpointRecord) -> Router {
        Router::new().route("/", record.route().clone())
    }

    #[test]
    fn registration_preserves_insertion_order() {
        let controller = Controller::new("users")
            .get("/", ok)
            .post("/", ok)
            .get("/{id}", ok)
            .put("/{id}", ok)
            .patch("/{id}", ok)
            .delete("/{id}", ok)
            .head("/{id}", ok)
            .options("/{id}", ok);

        let seen: Vec<(Method, &str)> = controller
            .endpoints()
            .iter()
            .map(|e| (e.method(), e.path()))
            .collect();

        assert_eq!(
            seen,
            vec![
                (Method::Get, "/"),
                (Method::Post, "/"),
                (Method::Get, "/{id}"),
                (Method::Put, "/{id}"),
                (Method::Patch, "/{id}"),
                (Method::Delete, "/{id}"),
                (Method::Head, "/{id}"),
                (Method::Options, "/{id}"),
            ]
        );
    }

    #[test]
    fn paths_are_stored_verbatim() {
        let controller = Controller::new("users").get("", ok).get("profile", ok);

        assert_eq!(controller.base_path(), "users");
        assert_eq!(controller.endpoints()[0].path(), "");
        assert_eq!(controller.endpoints()[1].path(), "profile");
    }

    #[test]
    fn middlewares_are_kept_per_level() {
        let controller = Controller::with_middleware("admin", [testing::group()])
            .get_with("/", ok, [testing::endpoint(), testing::extra()])
            .post("/", ok);

        assert_eq!(controller.middlewares().len(), 1);
        let names: Vec<&str> = controller.endpoints()[0]
            .middlewares()
            .iter()
            .map(Middleware::name)
            .collect();
        assert_eq!(names, vec!["endpoint", "extra"]);
        assert!(controller.endpoints()[1].middlewares().is_empty());
    }

    #[test]
    fn cloned_controller_is_independent() {
        let base = Controller::new("api").get("/a", ok);
        let extended = base.clone().get("/b", ok);

        assert_eq!(base.endpoints().len(), 1);
        assert_eq!(extended.endpoints().len(), 2);
    }

    #[tokio::test]
    async fn endpoint_only_answers_its_method() {
        let controller = Controller::new("").post("/", ok);
        let app = single_route(&controller.endpoints()[0]);

        let resp = app
            .clone()
            .oneshot(http::Request::post("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(http::Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn get_endpoint_also_answers_head_without_body() {
        let controller = Controller::new("").get("/", ok);
        let app = single_route(&controller.endpoints()[0]);

        let resp = app
            .oneshot(http::Request::head("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn redirect_sets_status_and_location() {
        let controller = Controller::new("").redirect(Method::Get, "/", "/login", StatusCode::FOUND);
        let app = single_route(&controller.endpoints()[0]);

        let resp = app
            .oneshot(http::Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()[header::LOCATION], "/login");
        assert!(controller.endpoints()[0].middlewares().is_empty());
    }

    #[tokio::test]
    async fn redirect_works_for_any_method() {
        let controller = Controller::new("").redirect(
            Method::Delete,
            "/",
            "https://example.com/gone",
            StatusCode::PERMANENT_REDIRECT,
        );
        let app = single_route(&controller.endpoints()[0]);

        let resp = app
            .oneshot(http::Request::delete("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::PERMANENT_REDIRECT);
        assert_eq!(resp.headers()[header::LOCATION], "https://example.com/gone");
    }

    #[tokio::test]
    async fn redirect_with_non_redirect_status_fails() {
        let controller = Controller::new("").redirect(Method::Get, "/", "/x", StatusCode::OK);
        let app = single_route(&controller.endpoints()[0]);

        let resp = app
            .oneshot(http::Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            resp.extensions()
                .get::<corral_core::UnhandledFailure>()
                .is_some()
        );
    }

    #[tokio::test]
    async fn view_without_registered_views_fails() {
        let controller = Controller::new("").view("/", "index.html", Value::Null);
        let app = single_route(&controller.endpoints()[0]);

        let resp = app
            .oneshot(http::Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(controller.endpoints()[0].method(), Method::Get);
    }
}
