//! # Auth service — the flows behind the HTTP surface
//!
//! Composes the verifiers, the identity resolver, the token issuer, and the
//! session registry into complete authentication flows: each login path
//! verifies its assertion, resolves the canonical user, mints a token pair,
//! and records the refresh fingerprint. Refresh rotates the pair and
//! revokes the session of the token it replaces, so every refresh token is
//! one-time-use.
//!
//! OAuth providers and Telegram are optional: a flow whose provider was
//! not configured fails with [`AuthError::ProviderNotConfigured`].

use chrono::Utc;
use tracing::info;

use crate::auth::{
    hash_password, GitHubOAuth, GoogleOAuth, PasswordVerifier, TelegramAuthData,
    TelegramVerifier,
};
use crate::error::{AuthError, Result};
use crate::identity::{IdentityResolver, VerifiedIdentity};
use crate::models::{ProviderKind, User, UserInfo};
use crate::session::{RefreshSession, SessionStore};
use crate::token::{TokenIssuer, TokenKind};

/// Successful authentication: the token pair plus the user it belongs to.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuthResult {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: UserInfo,
}

/// Password signup fields.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Mutable profile fields; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub description: Option<String>,
}

pub struct AuthService<U, S> {
    users: U,
    passwords: PasswordVerifier<U>,
    resolver: IdentityResolver<U>,
    sessions: S,
    issuer: TokenIssuer,
    telegram: Option<TelegramVerifier>,
    github: Option<GitHubOAuth>,
    google: Option<GoogleOAuth>,
}

impl<U, S> AuthService<U, S>
where
    U: crate::store::UserStore + Clone,
    S: SessionStore,
{
    pub fn new(users: U, sessions: S, issuer: TokenIssuer) -> Self {
        Self {
            passwords: PasswordVerifier::new(users.clone()),
            resolver: IdentityResolver::new(users.clone()),
            users,
            sessions,
            issuer,
            telegram: None,
            github: None,
            google: None,
        }
    }

    pub fn with_telegram(mut self, verifier: TelegramVerifier) -> Self {
        self.telegram = Some(verifier);
        self
    }

    pub fn with_github(mut self, oauth: GitHubOAuth) -> Self {
        self.github = Some(oauth);
        self
    }

    pub fn with_google(mut self, oauth: GoogleOAuth) -> Self {
        self.google = Some(oauth);
        self
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    // ------------------------------------------------------------------
    // Login & signup
    // ------------------------------------------------------------------

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResult> {
        if request.email.is_empty() {
            return Err(AuthError::MissingField("email"));
        }
        if request.password.is_empty() {
            return Err(AuthError::MissingField("password"));
        }

        let user = self
            .users
            .create(crate::store::NewUser {
                name: request.name.unwrap_or_default(),
                email: Some(request.email),
                username: request.username.filter(|s| !s.is_empty()),
                password_hash: Some(hash_password(&request.password)?),
                ..Default::default()
            })
            .await?;
        info!(user_id = user.id, "user registered");
        self.issue(&user).await
    }

    pub async fn login_password(&self, identifier: &str, password: &str) -> Result<AuthResult> {
        let user = self.passwords.verify(identifier, password).await?;
        info!(user_id = user.id, "password login");
        self.issue(&user).await
    }

    pub async fn login_telegram(&self, data: TelegramAuthData) -> Result<AuthResult> {
        let verifier = self
            .telegram
            .as_ref()
            .ok_or(AuthError::ProviderNotConfigured("telegram"))?;
        verifier.verify(&data)?;
        let (user, _) = self
            .resolver
            .resolve(&VerifiedIdentity::Telegram(data))
            .await?;
        self.issue(&user).await
    }

    // ------------------------------------------------------------------
    // OAuth flows
    // ------------------------------------------------------------------

    pub fn github_authorize_url(&self) -> Result<String> {
        Ok(self.github()?.authorize_url())
    }

    pub fn google_authorize_url(&self) -> Result<String> {
        Ok(self.google()?.authorize_url())
    }

    pub async fn github_callback(&self, state: &str, code: &str) -> Result<AuthResult> {
        let profile = self.github()?.exchange(state, code).await?;
        let (user, _) = self
            .resolver
            .resolve(&VerifiedIdentity::Github(profile))
            .await?;
        self.issue(&user).await
    }

    pub async fn google_callback(&self, state: &str, code: &str) -> Result<AuthResult> {
        let profile = self.google()?.exchange(state, code).await?;
        let (user, _) = self
            .resolver
            .resolve(&VerifiedIdentity::Google(profile))
            .await?;
        self.issue(&user).await
    }

    // ------------------------------------------------------------------
    // Token lifecycle
    // ------------------------------------------------------------------

    /// Rotate a refresh token: the old session is revoked once the new
    /// pair is persisted, so a captured token cannot be replayed.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResult> {
        let claims = self.issuer.validate(refresh_token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::TokenMalformed);
        }
        self.sessions.find_active(refresh_token).await?;

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let result = self.issue(&user).await?;
        self.sessions.revoke(refresh_token).await?;
        info!(user_id = user.id, "refresh token rotated");
        Ok(result)
    }

    /// Revoke the session of one refresh token. Idempotent.
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        self.sessions.revoke(refresh_token).await
    }

    /// Revoke every session of a user ("log out everywhere").
    pub async fn logout_all(&self, user_id: i64) -> Result<u64> {
        let revoked = self.sessions.revoke_all(user_id).await?;
        info!(user_id, revoked, "all sessions revoked");
        Ok(revoked)
    }

    /// Active sessions of a user, newest first.
    pub async fn sessions(&self, user_id: i64) -> Result<Vec<RefreshSession>> {
        self.sessions.active_for_user(user_id).await
    }

    // ------------------------------------------------------------------
    // Profile & account links
    // ------------------------------------------------------------------

    pub async fn me(&self, user_id: i64) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn update_profile(&self, user_id: i64, changes: ProfileUpdate) -> Result<User> {
        let mut user = self.me(user_id).await?;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(username) = changes.username {
            user.username = (!username.is_empty()).then_some(username);
        }
        if let Some(email) = changes.email {
            user.email = (!email.is_empty()).then_some(email);
        }
        if let Some(avatar_url) = changes.avatar_url {
            user.avatar_url = (!avatar_url.is_empty()).then_some(avatar_url);
        }
        if let Some(description) = changes.description {
            user.description = (!description.is_empty()).then_some(description);
        }
        self.users.update(&user).await
    }

    pub async fn link_telegram(&self, user_id: i64, data: TelegramAuthData) -> Result<User> {
        let verifier = self
            .telegram
            .as_ref()
            .ok_or(AuthError::ProviderNotConfigured("telegram"))?;
        verifier.verify(&data)?;
        self.resolver
            .link(user_id, &VerifiedIdentity::Telegram(data))
            .await
    }

    pub async fn link_github(&self, user_id: i64, state: &str, code: &str) -> Result<User> {
        let profile = self.github()?.exchange(state, code).await?;
        self.resolver
            .link(user_id, &VerifiedIdentity::Github(profile))
            .await
    }

    pub async fn link_google(&self, user_id: i64, state: &str, code: &str) -> Result<User> {
        let profile = self.google()?.exchange(state, code).await?;
        self.resolver
            .link(user_id, &VerifiedIdentity::Google(profile))
            .await
    }

    pub async fn unlink(&self, user_id: i64, kind: ProviderKind) -> Result<User> {
        self.resolver.unlink(user_id, kind).await
    }

    // ------------------------------------------------------------------

    /// Mint a pair for `user` and record the refresh fingerprint.
    async fn issue(&self, user: &User) -> Result<AuthResult> {
        let pair = self.issuer.mint(user)?;
        self.sessions
            .create(
                user.id,
                &pair.refresh_token,
                Utc::now() + self.issuer.refresh_ttl(),
            )
            .await?;
        Ok(AuthResult {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
            user: user.to_info(),
        })
    }

    fn github(&self) -> Result<&GitHubOAuth> {
        self.github
            .as_ref()
            .ok_or(AuthError::ProviderNotConfigured("github"))
    }

    fn google(&self) -> Result<&GoogleOAuth> {
        self.google
            .as_ref()
            .ok_or(AuthError::ProviderNotConfigured("google"))
    }
}
