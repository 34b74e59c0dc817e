//! # Collectives API
//!
//! HTTP surface of the event registration core: caller extraction, handlers,
//! the response envelope and the error to status mapping.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod rate_limit;
pub mod response;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
