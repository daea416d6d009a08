//! First-boot seed data.
//!
//! Populates an empty record store with the initial users and groups so the
//! token and authorization flows work out of the box. A store that already
//! holds users is left untouched.

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use idmesh_storage::{GroupMember, RecordStore, StorageError, StoredEmail, StoredGroup, StoredUser};

use crate::token::{hash_password, AuthError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

struct SeedUser {
    id: &'static str,
    user_name: &'static str,
    given_name: &'static str,
    family_name: &'static str,
    email: &'static str,
    dept: &'static str,
    risk_score: i64,
    password: &'static str,
    group: &'static str,
}

const SEED_USERS: [SeedUser; 3] = [
    SeedUser {
        id: "usr_jdoe",
        user_name: "jdoe",
        given_name: "John",
        family_name: "Doe",
        email: "john.doe@company.com",
        dept: "HR",
        risk_score: 20,
        password: "password123",
        group: "HR_READERS",
    },
    SeedUser {
        id: "usr_agonzalez",
        user_name: "agonzalez",
        given_name: "Ana",
        family_name: "Gonzalez",
        email: "ana.gonzalez@company.com",
        dept: "Finance",
        risk_score: 30,
        password: "finance2024",
        group: "FIN_APPROVERS",
    },
    SeedUser {
        id: "usr_mrios",
        user_name: "mrios",
        given_name: "Miguel",
        family_name: "Rios",
        email: "miguel.rios@company.com",
        dept: "IT",
        risk_score: 15,
        password: "admin_pass",
        group: "ADMINS",
    },
];

/// Seeds the initial users and groups if the store is empty.
pub async fn seed_initial_data<S: RecordStore>(store: &S) -> Result<(), SeedError> {
    if !store.list_users(None).await?.is_empty() {
        info!("record store already populated, skipping seed");
        return Ok(());
    }

    let now = Utc::now();
    for seed in &SEED_USERS {
        store
            .upsert_user(StoredUser {
                id: seed.id.to_string(),
                user_name: seed.user_name.to_string(),
                given_name: Some(seed.given_name.to_string()),
                family_name: Some(seed.family_name.to_string()),
                formatted_name: Some(format!("{} {}", seed.given_name, seed.family_name)),
                active: true,
                emails: vec![StoredEmail {
                    value: seed.email.to_string(),
                    primary: true,
                    kind: "work".to_string(),
                }],
                dept: Some(seed.dept.to_string()),
                risk_score: seed.risk_score,
                password_hash: Some(hash_password(seed.password)?),
                created: now,
                last_modified: now,
            })
            .await?;

        store
            .upsert_group(StoredGroup {
                id: format!("grp_{}", seed.group.to_lowercase()),
                display_name: seed.group.to_string(),
                members: vec![GroupMember {
                    value: seed.id.to_string(),
                    display: Some(seed.user_name.to_string()),
                }],
                created: now,
                last_modified: now,
            })
            .await?;
    }

    info!(users = SEED_USERS.len(), "seeded initial data");
    Ok(())
}
