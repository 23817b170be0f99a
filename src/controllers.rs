// ABOUTME: Demo controllers: home pages, a small user directory, and a token-guarded admin area.
// ABOUTME: Handlers return Failure or HttpError on error and let the dispatcher pick the response.

use axum::Json;
use axum::extract::Path;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::{Next, from_fn};
use axum::response::Response;
use corral_router::{Controller, Failure, HttpError, Method, Middleware};
use serde::Serialize;
use serde_json::json;

use crate::auth::AuthLayer;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: u32,
    pub name: &'static str,
}

const USERS: [User; 3] = [
    User { id: 1, name: "Ada" },
    User { id: 2, name: "Grace" },
    User { id: 3, name: "Barbara" },
];

/// `/`, `/about`, `/health`, and a permanent redirect from `/home`.
pub fn home() -> Controller {
    Controller::new("/")
        .view_with("/", "index.html", |ctx| {
            Ok(json!({
                "path": ctx.path(),
                "agent": ctx.header("user-agent").unwrap_or("an unknown client"),
                "users": USERS,
            }))
        })
        .view(
            "about",
            "about.html",
            json!({ "blurb": "A small site built from controllers." }),
        )
        .get("health", health)
        .redirect(Method::Get, "home", "/", StatusCode::MOVED_PERMANENTLY)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// JSON user directory under `/users`.
pub fn users() -> Controller {
    Controller::with_middleware("users", [Middleware::layer(from_fn(served_by)).named("served-by")])
        .get("", list_users)
        .get("/{id}", get_user)
}

async fn served_by(req: axum::extract::Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    resp.headers_mut().insert(
        HeaderName::from_static("x-served-by"),
        HeaderValue::from_static("users"),
    );
    resp
}

async fn list_users() -> Json<Vec<User>> {
    Json(USERS.to_vec())
}

async fn get_user(Path(id): Path<u32>) -> Result<Json<User>, HttpError> {
    USERS
        .iter()
        .find(|u| u.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| HttpError::new(StatusCode::NOT_FOUND, format!("no user with id {}", id)))
}

/// Token-guarded admin area under `/admin`.
pub fn admin(token: Option<&str>) -> Controller {
    Controller::with_middleware("admin", [Middleware::layer(AuthLayer::new(token)).named("auth")])
        .get("", || async { Json(json!({ "users": USERS.len() })) })
        .post("/crash", crash)
}

async fn crash() -> Result<(), Failure> {
    Err(Failure::msg("crash requested"))
}
