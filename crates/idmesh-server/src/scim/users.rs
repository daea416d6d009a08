//! SCIM user provisioning.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use idmesh_storage::{parse_filter, GroupMember, RecordStore, StoredEmail, StoredUser};

use crate::scim::{new_resource_id, ListResponse, Meta, ScimError, USER_SCHEMA};
use crate::token::hash_password;

/// SCIM name sub-attribute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
}

/// SCIM email sub-attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailPayload {
    pub value: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default = "default_email_type", rename = "type")]
    pub kind: String,
}

fn default_email_type() -> String {
    "work".to_string()
}

/// Body for `POST /scim/v2/Users`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserCreate {
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(default)]
    pub name: Option<NamePayload>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub emails: Vec<EmailPayload>,
    #[serde(default)]
    pub dept: Option<String>,
    #[serde(default, rename = "riskScore")]
    pub risk_score: i64,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Body for `PATCH /scim/v2/Users/{id}`. All fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub dept: Option<String>,
    #[serde(default, rename = "riskScore")]
    pub risk_score: Option<i64>,
    #[serde(default)]
    pub emails: Option<Vec<EmailPayload>>,
    /// Replacement set of group display names.
    #[serde(default)]
    pub groups: Option<Vec<String>>,
}

/// A user as returned over the wire.
#[derive(Debug, Clone, Serialize)]
pub struct UserResource {
    pub schemas: Vec<String>,
    pub id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<NamePayload>,
    pub active: bool,
    pub emails: Vec<EmailPayload>,
    /// Display names of groups this user belongs to (derived).
    pub groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dept: Option<String>,
    #[serde(rename = "riskScore")]
    pub risk_score: i64,
    pub meta: Meta,
}

/// CRUD over SCIM users.
pub struct ScimUserService<S> {
    store: Arc<S>,
}

impl<S: RecordStore> ScimUserService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn create(&self, payload: UserCreate) -> Result<UserResource, ScimError> {
        validate_username(&payload.user_name)?;
        validate_emails(&payload.emails)?;
        validate_risk_score(payload.risk_score)?;

        let password_hash = match payload.password.as_deref() {
            Some(password) => {
                Some(hash_password(password).map_err(|e| ScimError::Invalid(e.to_string()))?)
            }
            None => None,
        };

        let now = Utc::now();
        let name = payload.name.unwrap_or_default();
        let user = StoredUser {
            id: new_resource_id("usr"),
            user_name: payload.user_name.trim().to_string(),
            given_name: name.given_name.clone(),
            family_name: name.family_name.clone(),
            formatted_name: formatted_name(&name),
            active: payload.active,
            emails: payload
                .emails
                .iter()
                .map(|e| StoredEmail {
                    value: e.value.clone(),
                    primary: e.primary,
                    kind: e.kind.clone(),
                })
                .collect(),
            dept: payload.dept,
            risk_score: payload.risk_score,
            password_hash,
            created: now,
            last_modified: now,
        };

        self.store.upsert_user(user.clone()).await?;
        info!(user_id = %user.id, user_name = %user.user_name, "user created");
        Ok(self.to_resource(user).await)
    }

    pub async fn get(&self, id: &str) -> Result<UserResource, ScimError> {
        let user = self
            .store
            .get_user(id)
            .await?
            .ok_or_else(|| ScimError::NotFound {
                resource: "user",
                id: id.to_string(),
            })?;
        Ok(self.to_resource(user).await)
    }

    pub async fn list(
        &self,
        filter: Option<&str>,
    ) -> Result<ListResponse<UserResource>, ScimError> {
        let parsed = filter.map(parse_filter).transpose()?;
        let users = self.store.list_users(parsed.as_ref()).await?;
        let mut resources = Vec::with_capacity(users.len());
        for user in users {
            resources.push(self.to_resource(user).await);
        }
        Ok(ListResponse::of(resources))
    }

    pub async fn patch(&self, id: &str, patch: UserPatch) -> Result<UserResource, ScimError> {
        let mut user = self
            .store
            .get_user(id)
            .await?
            .ok_or_else(|| ScimError::NotFound {
                resource: "user",
                id: id.to_string(),
            })?;

        if let Some(active) = patch.active {
            user.active = active;
        }
        if let Some(dept) = patch.dept {
            user.dept = Some(dept);
        }
        if let Some(risk_score) = patch.risk_score {
            validate_risk_score(risk_score)?;
            user.risk_score = risk_score;
        }
        if let Some(emails) = patch.emails {
            validate_emails(&emails)?;
            user.emails = emails
                .iter()
                .map(|e| StoredEmail {
                    value: e.value.clone(),
                    primary: e.primary,
                    kind: e.kind.clone(),
                })
                .collect();
        }
        if let Some(group_names) = patch.groups {
            self.replace_memberships(&user, &group_names).await?;
        }

        user.last_modified = Utc::now();
        self.store.upsert_user(user.clone()).await?;
        info!(user_id = %user.id, "user patched");
        Ok(self.to_resource(user).await)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ScimError> {
        self.store.delete_user(id).await?;
        // Group records still holding a reference are cleaned lazily: reads
        // filter dangling members and group writes drop them.
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    /// Replaces the user's memberships so that exactly the named groups
    /// contain it. Group records are the source of truth for membership.
    async fn replace_memberships(
        &self,
        user: &StoredUser,
        group_names: &[String],
    ) -> Result<(), ScimError> {
        let mut wanted = Vec::new();
        for name in group_names {
            let group = self
                .store
                .find_group_by_display_name(name)
                .await?
                .ok_or_else(|| ScimError::Invalid(format!("unknown group: {name}")))?;
            if !wanted.iter().any(|(id, _)| id == &group.id) {
                wanted.push((group.id.clone(), group));
            }
        }

        let current = self.store.groups_containing_user(&user.id).await?;
        let now = Utc::now();

        for mut group in current {
            if !wanted.iter().any(|(id, _)| id == &group.id) {
                group.members.retain(|m| m.value != user.id);
                group.last_modified = now;
                self.store.upsert_group(group).await?;
            }
        }
        for (_, mut group) in wanted {
            if !group.members.iter().any(|m| m.value == user.id) {
                group.members.push(GroupMember {
                    value: user.id.clone(),
                    display: Some(user.user_name.clone()),
                });
                group.last_modified = now;
                self.store.upsert_group(group).await?;
            }
        }
        Ok(())
    }

    async fn to_resource(&self, user: StoredUser) -> UserResource {
        let groups = match self.store.groups_containing_user(&user.id).await {
            Ok(groups) => groups.into_iter().map(|g| g.display_name).collect(),
            Err(_) => Vec::new(),
        };

        let name = if user.given_name.is_some()
            || user.family_name.is_some()
            || user.formatted_name.is_some()
        {
            Some(NamePayload {
                given_name: user.given_name,
                family_name: user.family_name,
                formatted: user.formatted_name,
            })
        } else {
            None
        };

        UserResource {
            schemas: vec![USER_SCHEMA.to_string()],
            id: user.id.clone(),
            user_name: user.user_name,
            name,
            active: user.active,
            emails: user
                .emails
                .into_iter()
                .map(|e| EmailPayload {
                    value: e.value,
                    primary: e.primary,
                    kind: e.kind,
                })
                .collect(),
            groups,
            dept: user.dept,
            risk_score: user.risk_score,
            meta: Meta::new(
                "User",
                user.created,
                user.last_modified,
                format!("/scim/v2/Users/{}", user.id),
            ),
        }
    }
}

fn formatted_name(name: &NamePayload) -> Option<String> {
    if name.formatted.is_some() {
        return name.formatted.clone();
    }
    let formatted = [name.given_name.as_deref(), name.family_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if formatted.is_empty() {
        None
    } else {
        Some(formatted)
    }
}

fn validate_username(user_name: &str) -> Result<(), ScimError> {
    let trimmed = user_name.trim();
    if trimmed.len() < 2 || trimmed.len() > 50 {
        return Err(ScimError::Invalid(
            "userName must be between 2 and 50 characters".to_string(),
        ));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ScimError::Invalid(
            "userName may only contain letters, numbers, dots, hyphens and underscores"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_emails(emails: &[EmailPayload]) -> Result<(), ScimError> {
    let primaries = emails.iter().filter(|e| e.primary).count();
    if primaries > 1 {
        return Err(ScimError::Invalid(
            "only one email can be marked as primary".to_string(),
        ));
    }
    for email in emails {
        if !is_valid_email(&email.value) {
            return Err(ScimError::Invalid(format!(
                "invalid email format: {}",
                email.value
            )));
        }
    }
    Ok(())
}

fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
        && value.matches('@').count() == 1
}

fn validate_risk_score(risk_score: i64) -> Result<(), ScimError> {
    if !(0..=100).contains(&risk_score) {
        return Err(ScimError::Invalid(
            "riskScore must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use idmesh_storage::MemoryRecordStore;

    use super::*;

    fn service() -> ScimUserService<MemoryRecordStore> {
        ScimUserService::new(MemoryRecordStore::new_shared())
    }

    fn create_payload(user_name: &str) -> UserCreate {
        UserCreate {
            user_name: user_name.to_string(),
            name: Some(NamePayload {
                given_name: Some("John".to_string()),
                family_name: Some("Doe".to_string()),
                formatted: None,
            }),
            active: true,
            emails: vec![EmailPayload {
                value: "john.doe@company.com".to_string(),
                primary: true,
                kind: "work".to_string(),
            }],
            dept: Some("HR".to_string()),
            risk_score: 20,
            password: Some("password123".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_meta() {
        let service = service();
        let resource = service.create(create_payload("jdoe")).await.unwrap();

        assert!(resource.id.starts_with("usr_"));
        assert_eq!(resource.user_name, "jdoe");
        assert_eq!(resource.schemas, vec![USER_SCHEMA.to_string()]);
        assert_eq!(resource.meta.resource_type, "User");
        assert_eq!(resource.meta.created, resource.meta.last_modified);
        assert_eq!(
            resource.meta.location.as_deref(),
            Some(format!("/scim/v2/Users/{}", resource.id).as_str())
        );
        assert_eq!(
            resource.name.as_ref().unwrap().formatted.as_deref(),
            Some("John Doe")
        );
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts_and_store_unchanged() {
        let service = service();
        service.create(create_payload("jdoe")).await.unwrap();

        let err = service.create(create_payload("JDOE")).await.unwrap_err();
        assert!(matches!(err, ScimError::Conflict(_)));

        let list = service.list(Some(r#"userName eq "jdoe""#)).await.unwrap();
        assert_eq!(list.total_results, 1);
    }

    #[tokio::test]
    async fn test_get_unknown_user_is_not_found() {
        let err = service().get("usr_missing").await.unwrap_err();
        assert!(matches!(err, ScimError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_rejects_unsupported_filter() {
        let err = service()
            .list(Some(r#"userName co "jd""#))
            .await
            .unwrap_err();
        assert!(matches!(err, ScimError::BadFilter(_)));
    }

    #[tokio::test]
    async fn test_patch_updates_fields_and_last_modified() {
        let service = service();
        let created = service.create(create_payload("jdoe")).await.unwrap();

        let patched = service
            .patch(
                &created.id,
                UserPatch {
                    active: Some(false),
                    dept: Some("Finance".to_string()),
                    risk_score: Some(55),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap();

        assert!(!patched.active);
        assert_eq!(patched.dept.as_deref(), Some("Finance"));
        assert_eq!(patched.risk_score, 55);
        assert!(patched.meta.last_modified >= patched.meta.created);
    }

    #[tokio::test]
    async fn test_patch_rejects_out_of_range_risk_score() {
        let service = service();
        let created = service.create(create_payload("jdoe")).await.unwrap();

        let err = service
            .patch(
                &created.id,
                UserPatch {
                    risk_score: Some(250),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ScimError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_username_and_email() {
        let service = service();

        let mut bad_name = create_payload("x");
        bad_name.user_name = "x".to_string();
        assert!(matches!(
            service.create(bad_name).await.unwrap_err(),
            ScimError::Invalid(_)
        ));

        let mut bad_email = create_payload("asmith");
        bad_email.emails = vec![EmailPayload {
            value: "not-an-email".to_string(),
            primary: true,
            kind: "work".to_string(),
        }];
        assert!(matches!(
            service.create(bad_email).await.unwrap_err(),
            ScimError::Invalid(_)
        ));

        let mut two_primaries = create_payload("bsmith");
        two_primaries.emails = vec![
            EmailPayload {
                value: "a@company.com".to_string(),
                primary: true,
                kind: "work".to_string(),
            },
            EmailPayload {
                value: "b@company.com".to_string(),
                primary: true,
                kind: "home".to_string(),
            },
        ];
        assert!(matches!(
            service.create(two_primaries).await.unwrap_err(),
            ScimError::Invalid(_)
        ));
    }
}
