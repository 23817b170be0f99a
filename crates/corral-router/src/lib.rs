// ABOUTME: Declarative route composition for Axum: controllers, shared middleware, views, static mounts.
// ABOUTME: Every request failure is resolved by status code through a single error dispatcher.

pub mod builder;
pub mod config;
pub mod context;
pub mod controller;
pub mod dispatch;
pub mod middleware;
pub mod views;

pub use builder::{RouteBuilder, RouteEntry};
pub use config::{ConfigError, ServerConfig};
pub use context::RequestContext;
pub use controller::{Controller, EndpointRecord};
pub use corral_core::{Failure, HttpError, Method, UnhandledFailure, join, normalize};
pub use dispatch::{DispatchLayer, ErrorDispatcher, ErrorHandler};
pub use middleware::Middleware;
pub use views::{ViewError, Views};
