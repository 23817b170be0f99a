// ABOUTME: Per-request context handed to view-data callbacks and error handlers.
// ABOUTME: Snapshots method, URI, and headers, and renders templates from the registered views.

use axum::extract::Request;
use axum::response::{Html, IntoResponse, Response};
use http::{HeaderMap, Method, StatusCode, Uri};
use serde_json::Value;

use corral_core::Failure;

use crate::views::Views;

/// What a handler-independent callback may know about the current request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    views: Option<Views>,
}

impl RequestContext {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, views: Option<Views>) -> Self {
        Self {
            method,
            uri,
            headers,
            views,
        }
    }

    /// Snapshot a request. Views are picked up from the request extensions,
    /// where the dispatch layer places them.
    pub fn from_request(req: &Request) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: req.headers().clone(),
            views: req.extensions().get::<Views>().cloned(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn views(&self) -> Option<&Views> {
        self.views.as_ref()
    }

    /// Render a named template into an HTML body.
    pub fn render_html(&self, name: &str, data: &Value) -> Result<Html<String>, Failure> {
        let views = self
            .views
            .as_ref()
            .ok_or_else(|| Failure::msg(format!("cannot render {}: no views registered", name)))?;
        Ok(Html(views.render(name, data)?))
    }

    /// Render a named template with the given status code.
    pub fn render(&self, status: StatusCode, name: &str, data: &Value) -> Result<Response, Failure> {
        let html = self.render_html(name, data)?;
        Ok((status, html).into_response())
    }
}
