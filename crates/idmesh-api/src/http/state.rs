//! Application state for HTTP handlers.

use std::sync::Arc;

use idmesh_server::{AuthzService, ScimGroupService, ScimUserService, TokenService};
use idmesh_storage::RecordStore;

/// Application state shared across all HTTP handlers.
///
/// # Type Parameters
///
/// * `S` - The storage backend implementing `RecordStore`
pub struct AppState<S: RecordStore> {
    /// The storage backend.
    pub storage: Arc<S>,
    /// Bearer token issuance and validation.
    pub tokens: Arc<TokenService<S>>,
    /// SCIM user provisioning.
    pub users: Arc<ScimUserService<S>>,
    /// SCIM group provisioning.
    pub groups: Arc<ScimGroupService<S>>,
    /// Authorization facade over the rule engine.
    pub authz: Arc<AuthzService>,
}

impl<S: RecordStore> AppState<S> {
    /// Wires the SCIM services over the shared storage handle.
    pub fn new(storage: Arc<S>, tokens: Arc<TokenService<S>>, authz: Arc<AuthzService>) -> Self {
        let users = Arc::new(ScimUserService::new(Arc::clone(&storage)));
        let groups = Arc::new(ScimGroupService::new(Arc::clone(&storage)));
        Self {
            storage,
            tokens,
            users,
            groups,
            authz,
        }
    }
}

impl<S: RecordStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            tokens: Arc::clone(&self.tokens),
            users: Arc::clone(&self.users),
            groups: Arc::clone(&self.groups),
            authz: Arc::clone(&self.authz),
        }
    }
}
