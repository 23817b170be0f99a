// ABOUTME: Bearer token authentication middleware for the demo admin controller.
// ABOUTME: Missing or wrong tokens fail with 401; with no token configured every request fails with 403.

use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use axum::response::IntoResponse;
use corral_router::HttpError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A tower Layer that requires `Authorization: Bearer <token>`.
#[derive(Clone)]
pub struct AuthLayer {
    token: Option<Arc<str>>,
}

impl AuthLayer {
    /// Create a new AuthLayer. `None` disables access entirely.
    pub fn new(token: Option<&str>) -> Self {
        Self {
            token: token.map(Arc::from),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            token: self.token.clone(),
        }
    }
}

/// The middleware service that checks bearer tokens.
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    token: Option<Arc<str>>,
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
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

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let Some(token) = self.token.as_deref() else {
            return Box::pin(async {
                Ok(HttpError::new(StatusCode::FORBIDDEN, "admin access is disabled").into_response())
            });
        };

        let expected = format!("Bearer {}", token);
        let authorized = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected);

        if authorized {
            let clone = self.inner.clone();
            let mut inner = std::mem::replace(&mut self.inner, clone);
            Box::pin(async move { inner.call(req).await })
        } else {
            Box::pin(async { Ok(HttpError::unauthorized().into_response()) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::get;
    use corral_router::Failure;
    use tower::ServiceExt;

    fn test_router(token: Option<&str>) -> Router {
        Router::new()
            .route("/admin", get(|| async { "admin" }))
            .layer(AuthLayer::new(token))
    }

    fn status_of_failure(resp: &Response<Body>) -> Option<StatusCode> {
        resp.extensions()
            .get::<corral_router::UnhandledFailure>()
            .map(|u| u.failure())
            .and_then(Failure::as_http)
            .map(|e| e.status)
    }

    #[tokio::test]
    async fn auth_middleware_rejects_without_token() {
        let resp = test_router(Some("test-token-123"))
            .oneshot(Request::get("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of_failure(&resp), Some(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn auth_middleware_allows_with_valid_token() {
        let resp = test_router(Some("test-token-123"))
            .oneshot(
                Request::get("/admin")
                    .header("authorization", "Bearer test-token-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn auth_middleware_rejects_with_wrong_token() {
        let resp = test_router(Some("test-token-123"))
            .oneshot(
                Request::get("/admin")
                    .header("authorization", "Bearer wrong-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_middleware_forbids_when_disabled() {
        let resp = test_router(None)
            .oneshot(
                Request::get("/admin")
                    .header("authorization", "Bearer anything")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(status_of_failure(&resp), Some(StatusCode::FORBIDDEN));
    }
}
