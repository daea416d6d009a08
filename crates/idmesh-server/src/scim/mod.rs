//! SCIM provisioning services for users and groups.

pub mod groups;
pub mod users;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use idmesh_storage::StorageError;

pub const USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
pub const GROUP_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";
pub const LIST_RESPONSE_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:ListResponse";

/// Provisioning failures.
#[derive(Debug, Error)]
pub enum ScimError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),

    #[error("unsupported filter: {0}")]
    BadFilter(String),
}

impl From<StorageError> for ScimError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { resource, id } => ScimError::NotFound { resource, id },
            StorageError::Conflict { resource, key } => {
                ScimError::Conflict(format!("{resource} already exists: {key}"))
            }
            StorageError::BadFilter { message } => ScimError::BadFilter(message),
            StorageError::InvalidInput { message } => ScimError::Invalid(message),
        }
    }
}

/// Standard SCIM `meta` block.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub resource_type: String,
    pub created: String,
    pub last_modified: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Meta {
    pub fn new(
        resource_type: &str,
        created: DateTime<Utc>,
        last_modified: DateTime<Utc>,
        location: String,
    ) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            created: created.to_rfc3339(),
            last_modified: last_modified.to_rfc3339(),
            location: Some(location),
        }
    }
}

/// Standard SCIM list wrapper.
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub schemas: Vec<String>,
    #[serde(rename = "totalResults")]
    pub total_results: usize,
    #[serde(rename = "startIndex")]
    pub start_index: usize,
    #[serde(rename = "itemsPerPage")]
    pub items_per_page: usize,
    #[serde(rename = "Resources")]
    pub resources: Vec<T>,
}

impl<T: Serialize> ListResponse<T> {
    pub fn of(resources: Vec<T>) -> Self {
        Self {
            schemas: vec![LIST_RESPONSE_SCHEMA.to_string()],
            total_results: resources.len(),
            start_index: 1,
            items_per_page: resources.len().max(1),
            resources,
        }
    }
}

/// Generates a prefixed resource id, e.g. `usr_1f3c9a2b`.
pub(crate) fn new_resource_id(prefix: &str) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &uuid[..8])
}
