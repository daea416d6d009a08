//! In-memory RecordStore implementation.
//!
//! DashMap keeps reads lock-free from the caller's perspective; a single
//! async mutex serializes writers so secondary-key uniqueness checks and the
//! subsequent insert happen atomically.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    validate_group, validate_user, AttrFilter, RecordStore, StoredGroup, StoredUser,
};

/// In-memory implementation of [`RecordStore`].
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    users: DashMap<String, StoredUser>,
    groups: DashMap<String, StoredGroup>,
    /// Write gate: one writer at a time across both collections.
    write_gate: Mutex<()>,
}

impl MemoryRecordStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_user(&self, id: &str) -> StorageResult<Option<StoredUser>> {
        Ok(self.users.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_user_by_username(&self, user_name: &str) -> StorageResult<Option<StoredUser>> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.value().user_name.eq_ignore_ascii_case(user_name))
            .map(|entry| entry.value().clone()))
    }

    async fn list_users(&self, filter: Option<&AttrFilter>) -> StorageResult<Vec<StoredUser>> {
        let mut users: Vec<StoredUser> = match filter {
            None => self.users.iter().map(|e| e.value().clone()).collect(),
            Some(f) if f.attr == "userName" => self
                .users
                .iter()
                .filter(|e| e.value().user_name.eq_ignore_ascii_case(&f.value))
                .map(|e| e.value().clone())
                .collect(),
            Some(f) => {
                return Err(StorageError::BadFilter {
                    message: format!("unsupported filter attribute '{}'", f.attr),
                })
            }
        };
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn upsert_user(&self, user: StoredUser) -> StorageResult<()> {
        validate_user(&user)?;
        let _gate = self.write_gate.lock().await;

        let taken = self.users.iter().any(|entry| {
            entry.key() != &user.id
                && entry.value().user_name.eq_ignore_ascii_case(&user.user_name)
        });
        if taken {
            return Err(StorageError::Conflict {
                resource: "user",
                key: user.user_name,
            });
        }

        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn delete_user(&self, id: &str) -> StorageResult<()> {
        let _gate = self.write_gate.lock().await;
        if self.users.remove(id).is_none() {
            return Err(StorageError::NotFound {
                resource: "user",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_group(&self, id: &str) -> StorageResult<Option<StoredGroup>> {
        Ok(self.groups.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_group_by_display_name(
        &self,
        display_name: &str,
    ) -> StorageResult<Option<StoredGroup>> {
        Ok(self
            .groups
            .iter()
            .find(|entry| entry.value().display_name == display_name)
            .map(|entry| entry.value().clone()))
    }

    async fn list_groups(&self, filter: Option<&AttrFilter>) -> StorageResult<Vec<StoredGroup>> {
        let mut groups: Vec<StoredGroup> = match filter {
            None => self.groups.iter().map(|e| e.value().clone()).collect(),
            Some(f) if f.attr == "displayName" => self
                .groups
                .iter()
                .filter(|e| e.value().display_name == f.value)
                .map(|e| e.value().clone())
                .collect(),
            Some(f) => {
                return Err(StorageError::BadFilter {
                    message: format!("unsupported filter attribute '{}'", f.attr),
                })
            }
        };
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(groups)
    }

    #[instrument(skip(self, group), fields(group_id = %group.id))]
    async fn upsert_group(&self, group: StoredGroup) -> StorageResult<()> {
        validate_group(&group)?;
        let _gate = self.write_gate.lock().await;

        let taken = self.groups.iter().any(|entry| {
            entry.key() != &group.id && entry.value().display_name == group.display_name
        });
        if taken {
            return Err(StorageError::Conflict {
                resource: "group",
                key: group.display_name,
            });
        }

        self.groups.insert(group.id.clone(), group);
        Ok(())
    }

    async fn delete_group(&self, id: &str) -> StorageResult<()> {
        let _gate = self.write_gate.lock().await;
        if self.groups.remove(id).is_none() {
            return Err(StorageError::NotFound {
                resource: "group",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn groups_containing_user(&self, user_id: &str) -> StorageResult<Vec<StoredGroup>> {
        let mut groups: Vec<StoredGroup> = self
            .groups
            .iter()
            .filter(|entry| entry.value().members.iter().any(|m| m.value == user_id))
            .map(|entry| entry.value().clone())
            .collect();
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(groups)
    }
}
