//! SCIM group provisioning.
//!
//! Group records are the source of truth for membership. Members must
//! reference existing users at write time; references left dangling by a
//! user deletion are dropped lazily on the next read or write of the group.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use idmesh_storage::{parse_filter, GroupMember, RecordStore, StoredGroup};

use crate::scim::{new_resource_id, ListResponse, Meta, ScimError, GROUP_SCHEMA};

/// A member reference in request and response bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberPayload {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// Body for `POST /scim/v2/Groups`.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupCreate {
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(default)]
    pub members: Vec<MemberPayload>,
}

/// Body for `PATCH /scim/v2/Groups/{id}`.
///
/// `members`, when present, fully replaces the membership list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupPatch {
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub members: Option<Vec<MemberPayload>>,
}

/// A group as returned over the wire.
#[derive(Debug, Clone, Serialize)]
pub struct GroupResource {
    pub schemas: Vec<String>,
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub members: Vec<MemberPayload>,
    pub meta: Meta,
}

/// CRUD over SCIM groups.
pub struct ScimGroupService<S> {
    store: Arc<S>,
}

impl<S: RecordStore> ScimGroupService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn create(&self, payload: GroupCreate) -> Result<GroupResource, ScimError> {
        validate_display_name(&payload.display_name)?;
        let members = self.resolve_members(&payload.members).await?;

        let now = Utc::now();
        let group = StoredGroup {
            id: new_resource_id("grp"),
            display_name: payload.display_name.trim().to_string(),
            members,
            created: now,
            last_modified: now,
        };

        self.store.upsert_group(group.clone()).await?;
        info!(group_id = %group.id, display_name = %group.display_name, "group created");
        Ok(self.to_resource(group).await)
    }

    pub async fn get(&self, id: &str) -> Result<GroupResource, ScimError> {
        let group = self.require_group(id).await?;
        Ok(self.to_resource(group).await)
    }

    pub async fn list(
        &self,
        filter: Option<&str>,
    ) -> Result<ListResponse<GroupResource>, ScimError> {
        let parsed = filter.map(parse_filter).transpose()?;
        let groups = self.store.list_groups(parsed.as_ref()).await?;
        let mut resources = Vec::with_capacity(groups.len());
        for group in groups {
            resources.push(self.to_resource(group).await);
        }
        Ok(ListResponse::of(resources))
    }

    pub async fn patch(&self, id: &str, patch: GroupPatch) -> Result<GroupResource, ScimError> {
        let mut group = self.require_group(id).await?;

        if let Some(display_name) = patch.display_name {
            validate_display_name(&display_name)?;
            group.display_name = display_name.trim().to_string();
        }
        if let Some(members) = patch.members {
            group.members = self.resolve_members(&members).await?;
        } else {
            group.members = self.prune_dangling(group.members).await?;
        }

        group.last_modified = Utc::now();
        self.store.upsert_group(group.clone()).await?;
        info!(group_id = %group.id, "group patched");
        Ok(self.to_resource(group).await)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ScimError> {
        // Removing a group never deletes its member users.
        self.store.delete_group(id).await?;
        info!(group_id = %id, "group deleted");
        Ok(())
    }

    /// Adds one member, keeping membership unique by `value`.
    pub async fn add_member(
        &self,
        group_id: &str,
        member: MemberPayload,
    ) -> Result<GroupResource, ScimError> {
        let mut group = self.require_group(group_id).await?;

        let user = self
            .store
            .get_user(&member.value)
            .await?
            .ok_or_else(|| {
                ScimError::Invalid(format!("member references unknown user: {}", member.value))
            })?;

        group.members = self.prune_dangling(group.members).await?;
        if !group.members.iter().any(|m| m.value == member.value) {
            group.members.push(GroupMember {
                value: member.value,
                display: member.display.or(Some(user.user_name)),
            });
        }
        group.last_modified = Utc::now();
        self.store.upsert_group(group.clone()).await?;
        Ok(self.to_resource(group).await)
    }

    /// Removes one member by user id.
    pub async fn remove_member(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> Result<GroupResource, ScimError> {
        let mut group = self.require_group(group_id).await?;

        if !group.members.iter().any(|m| m.value == user_id) {
            return Err(ScimError::NotFound {
                resource: "group member",
                id: user_id.to_string(),
            });
        }

        group.members.retain(|m| m.value != user_id);
        group.members = self.prune_dangling(group.members).await?;
        group.last_modified = Utc::now();
        self.store.upsert_group(group.clone()).await?;
        info!(group_id = %group.id, user_id, "group member removed");
        Ok(self.to_resource(group).await)
    }

    async fn require_group(&self, id: &str) -> Result<StoredGroup, ScimError> {
        self.store
            .get_group(id)
            .await?
            .ok_or_else(|| ScimError::NotFound {
                resource: "group",
                id: id.to_string(),
            })
    }

    /// Validates and deduplicates a membership list; every member must
    /// reference an existing user.
    async fn resolve_members(
        &self,
        members: &[MemberPayload],
    ) -> Result<Vec<GroupMember>, ScimError> {
        let mut resolved: Vec<GroupMember> = Vec::with_capacity(members.len());
        for member in members {
            if resolved.iter().any(|m| m.value == member.value) {
                continue;
            }
            let user = self
                .store
                .get_user(&member.value)
                .await?
                .ok_or_else(|| {
                    ScimError::Invalid(format!(
                        "member references unknown user: {}",
                        member.value
                    ))
                })?;
            resolved.push(GroupMember {
                value: member.value.clone(),
                display: member.display.clone().or(Some(user.user_name)),
            });
        }
        Ok(resolved)
    }

    /// Drops member references whose user no longer exists.
    async fn prune_dangling(
        &self,
        members: Vec<GroupMember>,
    ) -> Result<Vec<GroupMember>, ScimError> {
        let mut kept = Vec::with_capacity(members.len());
        for member in members {
            if self.store.get_user(&member.value).await?.is_some() {
                kept.push(member);
            }
        }
        Ok(kept)
    }

    async fn to_resource(&self, group: StoredGroup) -> GroupResource {
        // Lazy cleanup: never show members whose user was deleted.
        let mut members = Vec::with_capacity(group.members.len());
        for member in &group.members {
            if let Ok(Some(_)) = self.store.get_user(&member.value).await {
                members.push(MemberPayload {
                    value: member.value.clone(),
                    display: member.display.clone(),
                });
            }
        }

        GroupResource {
            schemas: vec![GROUP_SCHEMA.to_string()],
            id: group.id.clone(),
            display_name: group.display_name,
            members,
            meta: Meta::new(
                "Group",
                group.created,
                group.last_modified,
                format!("/scim/v2/Groups/{}", group.id),
            ),
        }
    }
}

fn validate_display_name(display_name: &str) -> Result<(), ScimError> {
    let trimmed = display_name.trim();
    if trimmed.is_empty() {
        return Err(ScimError::Invalid("displayName is required".to_string()));
    }
    if trimmed.len() > 100 {
        return Err(ScimError::Invalid(
            "displayName must be 100 characters or less".to_string(),
        ));
    }
    Ok(())
}
