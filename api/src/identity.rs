//! # Identity resolution — one canonical user per external identity
//!
//! [`IdentityResolver::resolve`] turns a verified provider claim into a
//! canonical [`User`], in strict order, first match wins:
//!
//! 1. **Provider-id match** — the account has logged in before. Profile
//!    data fills only fields that are still empty; a field the user edited
//!    is never overwritten by provider data.
//! 2. **Email match** — another account (say, password-registered) owns
//!    the same address: the provider is linked to that account instead of
//!    creating a duplicate. If that account already carries a *different*
//!    id for this provider, resolution fails with
//!    [`AuthError::ProviderConflict`] rather than reassigning a link.
//! 3. **Create** — a new user with role `user` and the free tier.
//!
//! Two concurrent first-logins for the same identity both reach step 3;
//! the database's unique index lets exactly one insert win. The loser's
//! violation is retried as a provider-id lookup, so both callers resolve
//! to the same user.

use tracing::info;

use crate::auth::{GithubProfile, GoogleProfile, TelegramAuthData};
use crate::error::{AuthError, Result};
use crate::models::{ProviderKind, User};
use crate::store::{NewUser, UserStore};

/// An identity claim that already passed its provider's verification.
#[derive(Debug, Clone)]
pub enum VerifiedIdentity {
    Telegram(TelegramAuthData),
    Github(GithubProfile),
    Google(GoogleProfile),
}

impl VerifiedIdentity {
    pub fn provider(&self) -> ProviderKind {
        match self {
            VerifiedIdentity::Telegram(_) => ProviderKind::Telegram,
            VerifiedIdentity::Github(_) => ProviderKind::Github,
            VerifiedIdentity::Google(_) => ProviderKind::Google,
        }
    }

    /// The provider-native id: Telegram numeric id, GitHub login, Google
    /// subject.
    pub fn provider_id(&self) -> String {
        match self {
            VerifiedIdentity::Telegram(data) => data.id.to_string(),
            VerifiedIdentity::Github(profile) => profile.login.clone(),
            VerifiedIdentity::Google(profile) => profile.id.clone(),
        }
    }

    /// The email usable for cross-provider merging. Google addresses count
    /// only when the provider marked them verified.
    fn email(&self) -> Option<&str> {
        match self {
            VerifiedIdentity::Telegram(_) => None,
            VerifiedIdentity::Github(profile) => {
                profile.email.as_deref().filter(|e| !e.is_empty())
            }
            VerifiedIdentity::Google(profile) => {
                (profile.verified_email && !profile.email.is_empty())
                    .then_some(profile.email.as_str())
            }
        }
    }

    fn display_name(&self) -> String {
        match self {
            VerifiedIdentity::Telegram(data) => data.full_name(),
            VerifiedIdentity::Github(profile) => profile
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| profile.login.clone()),
            VerifiedIdentity::Google(profile) => {
                profile.name.clone().unwrap_or_default()
            }
        }
    }

    /// Copy profile data into fields that are still empty. Returns whether
    /// anything changed.
    pub fn fill_missing(&self, user: &mut User) -> bool {
        let mut changed = false;

        if user.name.is_empty() {
            let name = self.display_name();
            if !name.is_empty() {
                user.name = name;
                changed = true;
            }
        }
        if user.email.is_none() {
            if let Some(email) = self.email() {
                user.email = Some(email.to_string());
                changed = true;
            }
        }

        let (username, avatar_url, description) = match self {
            VerifiedIdentity::Telegram(data) => {
                (data.username.clone(), data.photo_url.clone(), None)
            }
            VerifiedIdentity::Github(profile) => (
                Some(profile.login.clone()),
                profile.avatar_url.clone(),
                profile.bio.clone(),
            ),
            VerifiedIdentity::Google(profile) => (None, profile.picture.clone(), None),
        };

        if user.username.is_none() {
            if let Some(username) = username.filter(|s| !s.is_empty()) {
                user.username = Some(username);
                changed = true;
            }
        }
        if user.avatar_url.is_none() {
            if let Some(avatar_url) = avatar_url.filter(|s| !s.is_empty()) {
                user.avatar_url = Some(avatar_url);
                changed = true;
            }
        }
        if user.description.is_none() {
            if let Some(description) = description.filter(|s| !s.is_empty()) {
                user.description = Some(description);
                changed = true;
            }
        }

        changed
    }

    fn to_new_user(&self) -> NewUser {
        let mut user = User {
            id: 0,
            name: String::new(),
            email: None,
            username: None,
            avatar_url: None,
            description: None,
            telegram_id: None,
            google_id: None,
            github_id: None,
            password_hash: None,
            role: crate::models::UserRole::User,
            subscription: crate::models::SubscriptionTier::Free,
            subscription_expires_at: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        self.fill_missing(&mut user);

        NewUser {
            name: user.name,
            email: user.email,
            username: user.username,
            avatar_url: user.avatar_url,
            description: user.description,
            password_hash: None,
            provider: Some((self.provider(), self.provider_id())),
        }
    }
}

/// Resolves verified identities to canonical users over a [`UserStore`].
pub struct IdentityResolver<S> {
    store: S,
}

impl<S: UserStore> IdentityResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Resolve to an existing or newly created user. The boolean is true
    /// when the user was created by this call.
    pub async fn resolve(&self, identity: &VerifiedIdentity) -> Result<(User, bool)> {
        let kind = identity.provider();
        let provider_id = identity.provider_id();

        // 1. The provider account is already linked.
        if let Some(mut user) = self.store.find_by_provider(kind, &provider_id).await? {
            if identity.fill_missing(&mut user) {
                user = self.store.update(&user).await?;
            }
            info!(user_id = user.id, provider = %kind, "user authenticated");
            return Ok((user, false));
        }

        // 2. An existing account owns the same email: link instead of
        //    duplicating.
        if let Some(email) = identity.email() {
            if let Some(mut user) = self.store.find_by_email(email).await? {
                if user.provider_id(kind).is_some() {
                    // The email's owner is tied to a different provider
                    // account; never reassign the link.
                    return Err(AuthError::ProviderConflict);
                }
                user.set_provider_id(kind, Some(provider_id.clone()));
                identity.fill_missing(&mut user);
                let user = self.store.update(&user).await?;
                info!(
                    user_id = user.id,
                    provider = %kind,
                    "provider linked to existing user by email"
                );
                return Ok((user, false));
            }
        }

        // 3. First login: create. A uniqueness violation means a concurrent
        //    first-login won the insert; resolve to the winner's row.
        match self.store.create(identity.to_new_user()).await {
            Ok(user) => {
                info!(user_id = user.id, provider = %kind, "new user created");
                Ok((user, true))
            }
            Err(AuthError::ProviderConflict | AuthError::DuplicateEmail) => {
                match self.store.find_by_provider(kind, &provider_id).await? {
                    Some(user) => Ok((user, false)),
                    None => Err(AuthError::ProviderConflict),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Attach a provider account to a specific user. Fails with
    /// [`AuthError::ProviderConflict`] when the account is held by someone
    /// else; re-linking the same account is a no-op.
    pub async fn link(&self, user_id: i64, identity: &VerifiedIdentity) -> Result<User> {
        let kind = identity.provider();
        let provider_id = identity.provider_id();

        if let Some(existing) = self.store.find_by_provider(kind, &provider_id).await? {
            if existing.id != user_id {
                return Err(AuthError::ProviderConflict);
            }
        }

        let mut user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        user.set_provider_id(kind, Some(provider_id.clone()));
        identity.fill_missing(&mut user);
        let user = self.store.update(&user).await?;
        info!(user_id, provider = %kind, "provider account linked");
        Ok(user)
    }

    /// Detach a provider from a user. Idempotent.
    pub async fn unlink(&self, user_id: i64, kind: ProviderKind) -> Result<User> {
        let mut user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        user.set_provider_id(kind, None);
        let user = self.store.update(&user).await?;
        info!(user_id, provider = %kind, "provider account unlinked");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use crate::store::MemoryUserStore;

    fn github(login: &str, email: Option<&str>) -> VerifiedIdentity {
        VerifiedIdentity::Github(GithubProfile {
            id: 1,
            login: login.into(),
            name: Some("Anna Codes".into()),
            email: email.map(String::from),
            avatar_url: Some("https://avatars.example/anna".into()),
            bio: Some("systems tinkerer".into()),
        })
    }

    fn telegram(id: i64, first_name: &str) -> VerifiedIdentity {
        VerifiedIdentity::Telegram(TelegramAuthData {
            id,
            first_name: first_name.into(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn first_login_creates_then_reuses() {
        let resolver = IdentityResolver::new(MemoryUserStore::new());

        let (user, is_new) = resolver.resolve(&telegram(123, "Anna")).await.unwrap();
        assert!(is_new);
        assert_eq!(user.name, "Anna");
        assert_eq!(user.telegram_id.as_deref(), Some("123"));

        let (again, is_new) = resolver.resolve(&telegram(123, "Other")).await.unwrap();
        assert!(!is_new);
        assert_eq!(again.id, user.id);
        // Name was already set, so provider data must not overwrite it.
        assert_eq!(again.name, "Anna");
    }

    #[tokio::test]
    async fn provider_data_fills_only_empty_fields() {
        let resolver = IdentityResolver::new(MemoryUserStore::new());

        let (user, _) = resolver.resolve(&telegram(123, "")).await.unwrap();
        assert_eq!(user.name, "");

        let (user, is_new) = resolver.resolve(&telegram(123, "Anna")).await.unwrap();
        assert!(!is_new);
        assert_eq!(user.name, "Anna");
    }

    #[tokio::test]
    async fn email_match_links_instead_of_duplicating() {
        let store = MemoryUserStore::new();
        let registered = store
            .create(crate::store::NewUser {
                name: "Anna".into(),
                email: Some("a@x.com".into()),
                password_hash: Some(hash_password("hunter2").unwrap()),
                ..Default::default()
            })
            .await
            .unwrap();

        let resolver = IdentityResolver::new(store);
        let identity = VerifiedIdentity::Google(GoogleProfile {
            id: "g-123".into(),
            email: "a@x.com".into(),
            verified_email: true,
            name: Some("Anna".into()),
            picture: None,
        });

        let (user, is_new) = resolver.resolve(&identity).await.unwrap();
        assert!(!is_new);
        assert_eq!(user.id, registered.id);
        assert_eq!(user.google_id.as_deref(), Some("g-123"));
    }

    #[tokio::test]
    async fn unverified_google_email_never_merges() {
        let store = MemoryUserStore::new();
        let registered = store
            .create(crate::store::NewUser {
                name: "Anna".into(),
                email: Some("a@x.com".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let resolver = IdentityResolver::new(store);
        let identity = VerifiedIdentity::Google(GoogleProfile {
            id: "g-123".into(),
            email: "a@x.com".into(),
            verified_email: false,
            name: None,
            picture: None,
        });

        // An unverified address cannot claim the existing account; the
        // login lands on a fresh user that carries no email at all.
        let (user, is_new) = resolver.resolve(&identity).await.unwrap();
        assert!(is_new);
        assert_ne!(user.id, registered.id);
        assert!(user.email.is_none());
    }

    #[tokio::test]
    async fn email_owner_with_other_provider_link_conflicts() {
        let store = MemoryUserStore::new();
        // a@x.com already belongs to a user linked to github:someone-else.
        store
            .create(crate::store::NewUser {
                name: "Someone".into(),
                email: Some("a@x.com".into()),
                provider: Some((ProviderKind::Github, "someone-else".into())),
                ..Default::default()
            })
            .await
            .unwrap();

        let resolver = IdentityResolver::new(store);
        let err = resolver
            .resolve(&github("anna", Some("a@x.com")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ProviderConflict));
    }

    #[tokio::test]
    async fn linking_someone_elses_account_conflicts() {
        let store = MemoryUserStore::new();
        let resolver = IdentityResolver::new(store.clone());

        // User 7 owns the github login.
        let (owner, _) = resolver.resolve(&github("anna", None)).await.unwrap();
        // User 9 is somebody else entirely.
        let other = store
            .create(crate::store::NewUser {
                name: "Other".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let err = resolver.link(other.id, &github("anna", None)).await.unwrap_err();
        assert!(matches!(err, AuthError::ProviderConflict));

        // The link stayed where it was.
        let still_owner = store
            .find_by_provider(ProviderKind::Github, "anna")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(still_owner.id, owner.id);
    }

    #[tokio::test]
    async fn unlink_clears_the_link() {
        let store = MemoryUserStore::new();
        let resolver = IdentityResolver::new(store.clone());

        let (user, _) = resolver.resolve(&telegram(123, "Anna")).await.unwrap();
        let user = resolver
            .unlink(user.id, ProviderKind::Telegram)
            .await
            .unwrap();
        assert!(user.telegram_id.is_none());

        // The same widget login now lands on a fresh account.
        let (recreated, is_new) = resolver.resolve(&telegram(123, "Anna")).await.unwrap();
        assert!(is_new);
        assert_ne!(recreated.id, user.id);
    }
}
