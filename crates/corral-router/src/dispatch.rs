// ABOUTME: Status-driven error dispatch: maps HTTP status codes to response-producing handlers.
// ABOUTME: Installed as the outermost layer so every failed request resolves to some response.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use tower::{Layer, Service};

use corral_core::{Failure, UnhandledFailure};

use crate::context::RequestContext;
use crate::views::Views;

/// Produces the response for a failed request.
pub type ErrorHandler = Arc<dyn Fn(&Failure, &RequestContext) -> axum::response::Response + Send + Sync>;

/// Maps status codes to error handlers. The last handler added for a
/// status wins.
#[derive(Clone)]
pub struct ErrorDispatcher {
    handlers: HashMap<StatusCode, ErrorHandler>,
}

fn plain_text(status: StatusCode, body: &'static str) -> ErrorHandler {
    Arc::new(move |_: &Failure, _: &RequestContext| (status, body).into_response())
}

impl ErrorDispatcher {
    /// A dispatcher with plain-text defaults for 404, 401, and 500.
    ///
    /// The default 500 handler hides failure descriptions; an unstructured
    /// failure's own description is written only once the 500 handler is
    /// removed (see [`ErrorDispatcher::resolve`]).
    pub fn new() -> Self {
        let mut dispatcher = Self::empty();
        dispatcher.add_handler(StatusCode::NOT_FOUND, plain_text(StatusCode::NOT_FOUND, "Not found"));
        dispatcher.add_handler(
            StatusCode::UNAUTHORIZED,
            plain_text(StatusCode::UNAUTHORIZED, "Unauthorized"),
        );
        dispatcher.add_handler(
            StatusCode::INTERNAL_SERVER_ERROR,
            plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        );
        dispatcher
    }

    /// A dispatcher with no handlers; every failure uses the raw fallback.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn add_handler(&mut self, status: StatusCode, handler: ErrorHandler) {
        self.handlers.insert(status, handler);
    }

    pub fn remove_handler(&mut self, status: StatusCode) -> Option<ErrorHandler> {
        self.handlers.remove(&status)
    }

    pub fn has_handler(&self, status: StatusCode) -> bool {
        self.handlers.contains_key(&status)
    }

    /// Turn a failure into a response.
    ///
    /// The failure is interpreted as a structured error (unstructured ones
    /// become 500 with their description). A handler registered for the
    /// resulting status produces the response; otherwise the raw status and
    /// message are written.
    pub fn resolve(&self, failure: &Failure, ctx: &RequestContext) -> axum::response::Response {
        let http = failure.to_http_error();

        if http.status.is_server_error() {
            tracing::error!(status = %http.status, path = %ctx.path(), error = %failure, "request failed");
        } else {
            tracing::debug!(status = %http.status, path = %ctx.path(), error = %failure, "request failed");
        }

        let mut resp = match self.handlers.get(&http.status) {
            Some(handler) => handler(failure, ctx),
            None => (http.status, http.message).into_response(),
        };
        resp.extensions_mut().remove::<UnhandledFailure>();
        resp
    }
}

impl Default for ErrorDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut statuses: Vec<u16> = self.handlers.keys().map(StatusCode::as_u16).collect();
        statuses.sort_unstable();
        f.debug_struct("ErrorDispatcher")
            .field("statuses", &statuses)
            .finish()
    }
}

/// A tower Layer that resolves failed responses through an [`ErrorDispatcher`].
///
/// Also makes the registered [`Views`] available to handlers through the
/// request extensions.
#[derive(Clone)]
pub struct DispatchLayer {
    dispatcher: Arc<ErrorDispatcher>,
    views: Option<Views>,
}

impl DispatchLayer {
    pub fn new(dispatcher: ErrorDispatcher, views: Option<Views>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            views,
        }
    }
}

impl<S> Layer<S> for DispatchLayer {
    type Service = DispatchService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DispatchService {
            inner,
            dispatcher: Arc::clone(&self.dispatcher),
            views: self.views.clone(),
        }
    }
}

/// The middleware service that swaps failure responses for dispatched ones.
#[derive(Clone)]
pub struct DispatchService<S> {
    inner: S,
    dispatcher: Arc<ErrorDispatcher>,
    views: Option<Views>,
}

impl<S> Service<Request<Body>> for DispatchService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        if let Some(views) = &self.views {
            req.extensions_mut().insert(views.clone());
        }
        let ctx = RequestContext::from_request(&req);
        let dispatcher = Arc::clone(&self.dispatcher);

        // The ready service is the one that must be called.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut resp = inner.call(req).await?;
            match resp.extensions_mut().remove::<UnhandledFailure>() {
                Some(unhandled) => Ok(dispatcher.resolve(unhandled.failure(), &ctx)),
                None => Ok(resp),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, Method, Uri};
    use axum::routing::get;
    use corral_core::HttpError;
    use tower::ServiceExt;

    fn ctx() -> RequestContext {
        RequestContext::new(Method::GET, Uri::from_static("/thing"), HeaderMap::new(), None)
    }

    async fn body_string(resp: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn structured_not_found_uses_default_body() {
        let dispatcher = ErrorDispatcher::new();

        let resp = dispatcher.resolve(&HttpError::not_found().into(), &ctx());

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(resp).await, "Not found");
    }

    #[tokio::test]
    async fn unstructured_failure_hits_default_internal_error() {
        let dispatcher = ErrorDispatcher::new();

        let resp = dispatcher.resolve(&Failure::msg("db exploded"), &ctx());

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(resp).await, "Internal server error");
    }

    #[tokio::test]
    async fn unstructured_failure_without_500_handler_writes_description() {
        let mut dispatcher = ErrorDispatcher::new();
        dispatcher.remove_handler(StatusCode::INTERNAL_SERVER_ERROR);

        let resp = dispatcher.resolve(&Failure::msg("db exploded"), &ctx());

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(resp).await, "db exploded");
    }

    #[tokio::test]
    async fn unknown_status_falls_back_to_raw_message() {
        let dispatcher = ErrorDispatcher::new();
        let failure = Failure::status(StatusCode::IM_A_TEAPOT, "short and stout");

        let resp = dispatcher.resolve(&failure, &ctx());

        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body_string(resp).await, "short and stout");
    }

    #[tokio::test]
    async fn added_handler_replaces_fallback() {
        let mut dispatcher = ErrorDispatcher::new();
        dispatcher.add_handler(
            StatusCode::FORBIDDEN,
            Arc::new(|failure: &Failure, ctx: &RequestContext| {
                (
                    StatusCode::FORBIDDEN,
                    format!("custom {} at {}", failure.to_http_error().message, ctx.path()),
                )
                    .into_response()
            }),
        );

        let resp = dispatcher.resolve(&HttpError::forbidden().into(), &ctx());

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_string(resp).await, "custom Forbidden at /thing");
    }

    #[tokio::test]
    async fn last_added_handler_wins() {
        let mut dispatcher = ErrorDispatcher::new();
        dispatcher.add_handler(StatusCode::NOT_FOUND, plain_text(StatusCode::NOT_FOUND, "first"));
        dispatcher.add_handler(StatusCode::NOT_FOUND, plain_text(StatusCode::NOT_FOUND, "second"));

        let resp = dispatcher.resolve(&HttpError::not_found().into(), &ctx());

        assert_eq!(body_string(resp).await, "second");
    }

    #[test]
    fn defaults_cover_not_found_unauthorized_and_internal() {
        let dispatcher = ErrorDispatcher::new();
        assert!(dispatcher.has_handler(StatusCode::NOT_FOUND));
        assert!(dispatcher.has_handler(StatusCode::UNAUTHORIZED));
        assert!(dispatcher.has_handler(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!dispatcher.has_handler(StatusCode::FORBIDDEN));
        assert_eq!(
            format!("{:?}", dispatcher),
            "ErrorDispatcher { statuses: [401, 404, 500] }"
        );
        assert!(!ErrorDispatcher::empty().has_handler(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn handler_returning_failure_is_not_dispatched_twice() {
        let mut dispatcher = ErrorDispatcher::empty();
        dispatcher.add_handler(
            StatusCode::NOT_FOUND,
            Arc::new(|_: &Failure, _: &RequestContext| Failure::msg("nested").into_response()),
        );

        let resp = dispatcher.resolve(&HttpError::not_found().into(), &ctx());

        assert!(resp.extensions().get::<UnhandledFailure>().is_none());
    }

    #[tokio::test]
    async fn layer_resolves_failures_and_passes_successes() {
        let app = Router::new()
            .route("/ok", get(|| async { "fine" }))
            .route(
                "/denied",
                get(|| async { Err::<&'static str, _>(HttpError::unauthorized()) }),
            )
            .layer(DispatchLayer::new(ErrorDispatcher::new(), None));

        let resp = app
            .clone()
            .oneshot(Request::get("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "fine");

        let resp = app
            .oneshot(Request::get("/denied").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_string(resp).await, "Unauthorized");
    }
}
