// ABOUTME: Request-time failure types: structured HTTP errors and arbitrary handler faults.
// ABOUTME: Failures turn into responses tagged so the router's error dispatcher can resolve them.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use axum_core::response::{IntoResponse, Response};
use http::StatusCode;
use thiserror::Error;

/// A failure that explicitly carries an HTTP status code and message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status}: {message}")]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Build an error whose message is the status code's canonical reason phrase.
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or_default())
    }

    pub fn not_found() -> Self {
        Self::from_status(StatusCode::NOT_FOUND)
    }

    pub fn unauthorized() -> Self {
        Self::from_status(StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden() -> Self {
        Self::from_status(StatusCode::FORBIDDEN)
    }

    pub fn method_not_allowed() -> Self {
        Self::from_status(StatusCode::METHOD_NOT_ALLOWED)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        Failure::from(self).into_response()
    }
}

/// Plain-message fault, used by [`Failure::msg`].
#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

/// Any failure raised while handling a request.
///
/// Wraps either an [`HttpError`] or an arbitrary error. Like `anyhow::Error`
/// it does not implement `std::error::Error` itself, so `?` converts any
/// error type into it.
pub struct Failure {
    source: Box<dyn StdError + Send + Sync + 'static>,
}

impl Failure {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            source: Box::new(error),
        }
    }

    /// An unstructured failure described only by a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::new(Message(message.to_string()))
    }

    /// A structured failure with the given status and message.
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(HttpError::new(status, message))
    }

    /// The structured error, if this failure is one.
    pub fn as_http(&self) -> Option<&HttpError> {
        self.source.downcast_ref::<HttpError>()
    }

    /// Interpret this failure as a structured error. Unstructured failures
    /// become a 500 carrying the failure's description.
    pub fn to_http_error(&self) -> HttpError {
        match self.as_http() {
            Some(http) => http.clone(),
            None => HttpError::internal(self.source.to_string()),
        }
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.source.downcast_ref::<E>()
    }

    pub fn source(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

impl<E> From<E> for Failure
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.source, f)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl IntoResponse for Failure {
    /// Produces the raw status + message response and tags it with the
    /// failure, so an installed dispatcher can replace it.
    fn into_response(self) -> Response {
        let http = self.to_http_error();
        let mut resp = (http.status, http.message).into_response();
        resp.extensions_mut().insert(UnhandledFailure(Arc::new(self)));
        resp
    }
}

/// Response extension marking a response produced from a [`Failure`] that
/// has not been resolved by an error dispatcher yet.
#[derive(Clone)]
pub struct UnhandledFailure(Arc<Failure>);

impl UnhandledFailure {
    pub fn failure(&self) -> &Failure {
        &self.0
    }
}

impl fmt::Debug for UnhandledFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UnhandledFailure").field(&self.0).finish()
    }
}
