// ABOUTME: Demo site for corral: a handful of controllers, template views, and error pages.
// ABOUTME: Shows how controllers, middleware, static files, and the error dispatcher fit together.

pub mod auth;
pub mod controllers;

use axum::Router;
use corral_router::{Middleware, RouteBuilder, ServerConfig, ViewError};
use serde_json::json;
use tower_http::trace::TraceLayer;

/// Assemble the demo application. Fails if the view directory cannot be
/// loaded; callers should treat that as fatal.
pub fn build_app(config: &ServerConfig) -> Result<Router, ViewError> {
    let mut builder = RouteBuilder::with_middleware([
        Middleware::layer(TraceLayer::new_for_http()).named("trace"),
    ]);

    let error_data = json!({ "home": "/" });

    builder
        .register_views(&config.views_dir, &config.view_ext)?
        .register_static(&config.static_prefix, &config.static_dir)
        .register(&controllers::home())
        .register(&controllers::users())
        .register(&controllers::admin(config.admin_token.as_deref()))
        .not_found_view("errors/404.html", error_data.clone())
        .unauthorized_view("errors/401.html", error_data.clone())
        .forbidden_view("errors/403.html", error_data.clone())
        .internal_server_error_view("errors/500.html", error_data);

    for route in builder.routes() {
        tracing::info!(method = %route.method(), path = %route.path(), "route");
    }

    Ok(builder.build())
}
