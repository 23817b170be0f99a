// ABOUTME: Core value types for corral, independent of any particular router engine.
// ABOUTME: Exposes path normalization, the HTTP method set, and request failure types.

pub mod error;
pub mod method;
pub mod path;

pub use error::{Failure, HttpError, UnhandledFailure};
pub use method::{Method, ParseMethodError};
pub use path::{join, normalize};
