//! idmesh-api: HTTP surface for the identity microservice.
//!
//! Routes, state wiring, middleware, and the single point where typed
//! service errors become HTTP responses.

pub mod errors;
pub mod http;
pub mod middleware;
pub mod observability;

pub use errors::ApiError;
pub use http::{create_router, AppState};
