//! RecordStore trait definition and stored record types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{StorageError, StorageResult};

/// Maximum length for string fields.
const MAX_FIELD_LENGTH: usize = 255;

/// An email address attached to a user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEmail {
    pub value: String,
    pub primary: bool,
    /// Email type, e.g. "work".
    pub kind: String,
}

/// A stored user record.
///
/// `user_name` is the unique secondary key; uniqueness is case-insensitive.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredUser {
    pub id: String,
    pub user_name: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub formatted_name: Option<String>,
    pub active: bool,
    pub emails: Vec<StoredEmail>,
    pub dept: Option<String>,
    pub risk_score: i64,
    /// Argon2 PHC string; embeds algorithm parameters and salt.
    pub password_hash: Option<String>,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// A member reference inside a group record. `value` is a user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub value: String,
    pub display: Option<String>,
}

/// A stored group record.
///
/// `display_name` is the unique secondary key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredGroup {
    pub id: String,
    pub display_name: String,
    pub members: Vec<GroupMember>,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// A parsed list filter of the form `attr eq "literal"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrFilter {
    pub attr: String,
    pub value: String,
}

/// Parses the supported filter grammar: `attr eq "literal"`.
///
/// Only equality against a double-quoted literal is supported; anything else
/// fails with `StorageError::BadFilter`.
///
/// # Examples
/// ```
/// use idmesh_storage::parse_filter;
///
/// let filter = parse_filter(r#"userName eq "jdoe""#).unwrap();
/// assert_eq!(filter.attr, "userName");
/// assert_eq!(filter.value, "jdoe");
///
/// assert!(parse_filter("userName co \"jd\"").is_err());
/// ```
pub fn parse_filter(input: &str) -> StorageResult<AttrFilter> {
    let bad = || StorageError::BadFilter {
        message: format!("expected `attr eq \"literal\"`, got '{input}'"),
    };

    let mut parts = input.trim().splitn(3, ' ');
    let attr = parts.next().filter(|s| !s.is_empty()).ok_or_else(bad)?;
    let op = parts.next().ok_or_else(bad)?;
    let literal = parts.next().map(str::trim).ok_or_else(bad)?;

    if op != "eq" {
        return Err(StorageError::BadFilter {
            message: format!("unsupported operator '{op}', only eq is supported"),
        });
    }
    let value = literal
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(bad)?;
    if value.contains('"') {
        return Err(bad());
    }

    Ok(AttrFilter {
        attr: attr.to_string(),
        value: value.to_string(),
    })
}

fn require_field(value: &str, field: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidInput {
            message: format!("{field} cannot be empty"),
        });
    }
    if value.len() > MAX_FIELD_LENGTH {
        return Err(StorageError::InvalidInput {
            message: format!("{field} exceeds maximum length of {MAX_FIELD_LENGTH} characters"),
        });
    }
    Ok(())
}

/// Structural validation for a user record.
pub fn validate_user(user: &StoredUser) -> StorageResult<()> {
    require_field(&user.id, "id")?;
    require_field(&user.user_name, "userName")?;
    if !(0..=100).contains(&user.risk_score) {
        return Err(StorageError::InvalidInput {
            message: "riskScore must be between 0 and 100".to_string(),
        });
    }
    for email in &user.emails {
        require_field(&email.value, "email value")?;
    }
    Ok(())
}

/// Structural validation for a group record.
pub fn validate_group(group: &StoredGroup) -> StorageResult<()> {
    require_field(&group.id, "id")?;
    require_field(&group.display_name, "displayName")?;
    for member in &group.members {
        require_field(&member.value, "member value")?;
    }
    Ok(())
}

/// Abstract keyed store for identity records.
///
/// Implementations must be thread-safe (`Send + Sync`) and serialize writes
/// so uniqueness checks and inserts are atomic. Reads return owned copies;
/// callers can never mutate store internals through a lookup.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    // User operations

    /// Gets a user by primary key.
    async fn get_user(&self, id: &str) -> StorageResult<Option<StoredUser>>;

    /// Finds a user by userName (case-insensitive).
    async fn find_user_by_username(&self, user_name: &str) -> StorageResult<Option<StoredUser>>;

    /// Lists users, optionally filtered. The only filterable attribute is
    /// `userName`.
    async fn list_users(&self, filter: Option<&AttrFilter>) -> StorageResult<Vec<StoredUser>>;

    /// Inserts or replaces a user. Fails with `Conflict` when a different
    /// record already holds the userName.
    async fn upsert_user(&self, user: StoredUser) -> StorageResult<()>;

    /// Deletes a user. Fails with `NotFound` when absent. Group records that
    /// reference the user are not rewritten here; readers and group writers
    /// drop dangling references.
    async fn delete_user(&self, id: &str) -> StorageResult<()>;

    // Group operations

    /// Gets a group by primary key.
    async fn get_group(&self, id: &str) -> StorageResult<Option<StoredGroup>>;

    /// Finds a group by displayName.
    async fn find_group_by_display_name(
        &self,
        display_name: &str,
    ) -> StorageResult<Option<StoredGroup>>;

    /// Lists groups, optionally filtered. The only filterable attribute is
    /// `displayName`.
    async fn list_groups(&self, filter: Option<&AttrFilter>) -> StorageResult<Vec<StoredGroup>>;

    /// Inserts or replaces a group. Fails with `Conflict` when a different
    /// record already holds the displayName.
    async fn upsert_group(&self, group: StoredGroup) -> StorageResult<()>;

    /// Deletes a group. Fails with `NotFound` when absent.
    async fn delete_group(&self, id: &str) -> StorageResult<()>;

    /// Groups whose member list references the given user id.
    async fn groups_containing_user(&self, user_id: &str) -> StorageResult<Vec<StoredGroup>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter_happy_path() {
        let filter = parse_filter(r#"userName eq "jdoe""#).unwrap();
        assert_eq!(
            filter,
            AttrFilter {
                attr: "userName".to_string(),
                value: "jdoe".to_string()
            }
        );
    }

    #[test]
    fn test_parse_filter_allows_spaces_in_literal() {
        let filter = parse_filter(r#"displayName eq "Payroll Readers""#).unwrap();
        assert_eq!(filter.value, "Payroll Readers");
    }

    #[test]
    fn test_parse_filter_rejects_other_operators() {
        for input in [
            r#"userName co "jd""#,
            r#"userName sw "j""#,
            r#"userName ne "jdoe""#,
        ] {
            assert!(matches!(
                parse_filter(input),
                Err(StorageError::BadFilter { .. })
            ));
        }
    }

    #[test]
    fn test_parse_filter_rejects_unquoted_literal() {
        assert!(parse_filter("userName eq jdoe").is_err());
    }

    #[test]
    fn test_parse_filter_rejects_garbage() {
        assert!(parse_filter("").is_err());
        assert!(parse_filter("userName").is_err());
        assert!(parse_filter(r#"userName eq "jd"oe""#).is_err());
    }

    #[test]
    fn test_validate_user_risk_score_bounds() {
        let mut user = StoredUser {
            id: "usr_1".to_string(),
            user_name: "jdoe".to_string(),
            given_name: None,
            family_name: None,
            formatted_name: None,
            active: true,
            emails: Vec::new(),
            dept: None,
            risk_score: 100,
            password_hash: None,
            created: Utc::now(),
            last_modified: Utc::now(),
        };
        assert!(validate_user(&user).is_ok());

        user.risk_score = 101;
        assert!(validate_user(&user).is_err());
    }

    #[test]
    fn test_record_store_is_object_safe() {
        fn _assert_object_safe(_: &dyn RecordStore) {}
    }
}
