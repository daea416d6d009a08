//! HTTP surface: routes, handlers, and shared state.

mod auth;
mod authz;
mod routes;
mod scim_groups;
mod scim_users;
mod state;


pub use routes::{create_router, create_router_with_body_limit, DEFAULT_BODY_LIMIT};
pub use state::AppState;
