//! In-memory user store for tests and local development.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::error::{AuthError, Result};
use crate::models::{ProviderKind, SubscriptionTier, User, UserRole};

use super::{NewUser, UserStore};

#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<Mutex<HashMap<i64, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_where<F: Fn(&User) -> bool>(&self, pred: F) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|u| pred(u))
            .cloned()
    }

    /// Enforces the same uniqueness rules the Postgres indexes do.
    fn check_unique(&self, candidate: &User) -> Result<()> {
        let users = self.users.lock().unwrap();
        for other in users.values() {
            if other.id == candidate.id {
                continue;
            }
            if candidate.email.is_some() && candidate.email == other.email {
                return Err(AuthError::DuplicateEmail);
            }
            if candidate.username.is_some() && candidate.username == other.username {
                return Err(AuthError::DuplicateUsername);
            }
            for kind in [
                ProviderKind::Telegram,
                ProviderKind::Google,
                ProviderKind::Github,
            ] {
                if candidate.provider_id(kind).is_some()
                    && candidate.provider_id(kind) == other.provider_id(kind)
                {
                    return Err(AuthError::ProviderConflict);
                }
            }
        }
        Ok(())
    }
}

impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_provider(
        &self,
        kind: ProviderKind,
        provider_id: &str,
    ) -> Result<Option<User>> {
        if kind == ProviderKind::Password {
            return Ok(None);
        }
        Ok(self.find_where(|u| u.provider_id(kind) == Some(provider_id)))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.find_where(|u| u.email.as_deref() == Some(email)))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.find_where(|u| u.username.as_deref() == Some(username)))
    }

    async fn create(&self, new: NewUser) -> Result<User> {
        let now = Utc::now();
        let id = self.users.lock().unwrap().len() as i64 + 1;
        let mut user = User {
            id,
            name: new.name,
            email: new.email,
            username: new.username,
            avatar_url: new.avatar_url,
            description: new.description,
            telegram_id: None,
            google_id: None,
            github_id: None,
            password_hash: new.password_hash,
            role: UserRole::User,
            subscription: SubscriptionTier::Free,
            subscription_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        if let Some((kind, provider_id)) = new.provider {
            user.set_provider_id(kind, Some(provider_id));
        }

        self.check_unique(&user)?;
        self.users.lock().unwrap().insert(id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User> {
        self.check_unique(user)?;
        let mut users = self.users.lock().unwrap();
        if !users.contains_key(&user.id) {
            return Err(AuthError::UserNotFound);
        }
        let mut updated = user.clone();
        updated.updated_at = Utc::now();
        users.insert(user.id, updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_enforces_provider_uniqueness() {
        let store = MemoryUserStore::new();
        let new = NewUser {
            name: "Anna".into(),
            provider: Some((ProviderKind::Telegram, "123".into())),
            ..Default::default()
        };
        store.create(new.clone()).await.unwrap();

        let err = store.create(new).await.unwrap_err();
        assert!(matches!(err, AuthError::ProviderConflict));
    }

    #[tokio::test]
    async fn create_enforces_email_uniqueness() {
        let store = MemoryUserStore::new();
        let new = NewUser {
            name: "Anna".into(),
            email: Some("a@x.com".into()),
            ..Default::default()
        };
        store.create(new.clone()).await.unwrap();

        let err = store.create(new).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
    }

    #[tokio::test]
    async fn lookups_match_by_provider_and_email() {
        let store = MemoryUserStore::new();
        let created = store
            .create(NewUser {
                name: "Anna".into(),
                email: Some("a@x.com".into()),
                provider: Some((ProviderKind::Github, "anna".into())),
                ..Default::default()
            })
            .await
            .unwrap();

        let by_provider = store
            .find_by_provider(ProviderKind::Github, "anna")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_provider.id, created.id);

        let by_email = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);

        assert!(store
            .find_by_provider(ProviderKind::Google, "anna")
            .await
            .unwrap()
            .is_none());
    }
}
