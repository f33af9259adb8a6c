//! In-process [`UserStore`] used by the fake application state.

use std::collections::HashMap;

use axum::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    repo::{StoreError, UserStore},
    repo_types::{NewUser, User, UserChanges},
};

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stand-in for the administrative path that deactivates accounts.
    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.is_active = active;
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        // Check and insert under one lock, like a unique index would.
        let mut users = self.users.lock().await;
        if users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Duplicate("email"));
        }
        if users.values().any(|u| u.username == new_user.username) {
            return Err(StoreError::Duplicate("username"));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            username: new_user.username,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            password_hash: new_user.password_hash,
            profile_image: None,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
            last_login_at: None,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;
        if !users.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if let Some(username) = &changes.username {
            if users.values().any(|u| u.id != id && &u.username == username) {
                return Err(StoreError::Duplicate("username"));
            }
        }

        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(first_name) = changes.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            user.last_name = last_name;
        }
        if let Some(profile_image) = changes.profile_image {
            user.profile_image = profile_image;
        }
        Ok(user.clone())
    }

    async fn record_login(&self, id: Uuid) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.last_login_at = Some(OffsetDateTime::now_utc());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.into(),
            username: username.into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            password_hash: "$argon2id$fake".into(),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email_and_username() {
        let store = MemoryUserStore::new();
        store.create(candidate("a@b.com", "ab")).await.unwrap();

        let err = store.create(candidate("a@b.com", "other")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("email")));

        let err = store.create(candidate("c@d.com", "ab")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("username")));

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn update_touches_only_supplied_fields() {
        let store = MemoryUserStore::new();
        let user = store.create(candidate("a@b.com", "ab")).await.unwrap();

        let updated = store
            .update(
                user.id,
                UserChanges {
                    first_name: Some("X".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name, "X");
        assert_eq!(updated.last_name, "Lovelace");
        assert_eq!(updated.username, "ab");
        assert_eq!(updated.email, "a@b.com");
    }

    #[tokio::test]
    async fn update_rejects_taken_username_and_unknown_id() {
        let store = MemoryUserStore::new();
        store.create(candidate("a@b.com", "ab")).await.unwrap();
        let other = store.create(candidate("c@d.com", "cd")).await.unwrap();

        let err = store
            .update(
                other.id,
                UserChanges {
                    username: Some("ab".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("username")));

        let err = store
            .update(Uuid::new_v4(), UserChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn record_login_sets_timestamp() {
        let store = MemoryUserStore::new();
        let user = store.create(candidate("a@b.com", "ab")).await.unwrap();
        assert!(user.last_login_at.is_none());

        store.record_login(user.id).await.unwrap();
        let reloaded = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(reloaded.last_login_at.is_some());
    }
}
