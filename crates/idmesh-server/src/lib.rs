//! idmesh-server: the services behind the HTTP surface.
//!
//! - [`config`] — environment-driven service configuration
//! - [`token`] — bearer token issuance and validation
//! - [`scim`] — user and group provisioning services
//! - [`authz`] — authorization facade over the rule engine
//! - [`seed`] — first-boot data

pub mod authz;
pub mod config;
pub mod scim;
pub mod seed;
pub mod token;

pub use authz::{AuditContext, AuthzService};
pub use config::{ConfigLoadError, ServiceConfig};
pub use scim::{groups::ScimGroupService, users::ScimUserService, ScimError};
pub use token::{AuthError, Claims, TokenRequest, TokenResponse, TokenService};
