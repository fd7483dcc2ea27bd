//! # User model — the canonical identity record
//!
//! Defines the two representations of a user:
//!
//! ## [`User`]
//!
//! The complete database row from the `users` table. Provider links are
//! nullable columns (`telegram_id`, `google_id`, `github_id`), each backed
//! by a partial unique index so a given provider account can belong to at
//! most one user. `password_hash` is an Argon2 PHC string, present only for
//! accounts registered with a password.
//!
//! ## [`UserInfo`]
//!
//! A client-safe projection produced by [`User::to_info`]. It omits the
//! password hash and raw provider ids and reports the *effective*
//! subscription tier (an expired paid tier reads as `free`).
//!
//! Roles and subscription tiers are strict total orders: `user < mentor <
//! admin` and `free < pro < team < enterprise`. Authorization checks compare
//! with `>=`; no tier is a wildcard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role hierarchy. A role satisfies any requirement at or below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Mentor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Mentor => "mentor",
            UserRole::Admin => "admin",
        }
    }

    /// Parses a stored role, defaulting to `user` for unknown values.
    pub fn parse(s: &str) -> Self {
        match s {
            "mentor" => UserRole::Mentor,
            "admin" => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription hierarchy. `free` satisfies only `free`-gated checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Pro,
    Team,
    Enterprise,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Pro => "pro",
            SubscriptionTier::Team => "team",
            SubscriptionTier::Enterprise => "enterprise",
        }
    }

    /// Parses a stored tier. Legacy rows use `trial` for the entry tier.
    pub fn parse(s: &str) -> Self {
        match s {
            "pro" => SubscriptionTier::Pro,
            "team" => SubscriptionTier::Team,
            "enterprise" => SubscriptionTier::Enterprise,
            _ => SubscriptionTier::Free,
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An external identity source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Telegram,
    Google,
    Github,
    Password,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Telegram => "telegram",
            ProviderKind::Google => "google",
            ProviderKind::Github => "github",
            ProviderKind::Password => "password",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "telegram" => Some(ProviderKind::Telegram),
            "google" => Some(ProviderKind::Google),
            "github" => Some(ProviderKind::Github),
            "password" => Some(ProviderKind::Password),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full user record from the database.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub description: Option<String>,
    pub telegram_id: Option<String>,
    pub google_id: Option<String>,
    pub github_id: Option<String>,
    pub password_hash: Option<String>,
    pub role: UserRole,
    pub subscription: SubscriptionTier,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The provider-native id linked for `kind`, if any. Password accounts
    /// are identified by email/username, not a link column.
    pub fn provider_id(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::Telegram => self.telegram_id.as_deref(),
            ProviderKind::Google => self.google_id.as_deref(),
            ProviderKind::Github => self.github_id.as_deref(),
            ProviderKind::Password => None,
        }
    }

    pub fn set_provider_id(&mut self, kind: ProviderKind, id: Option<String>) {
        match kind {
            ProviderKind::Telegram => self.telegram_id = id,
            ProviderKind::Google => self.google_id = id,
            ProviderKind::Github => self.github_id = id,
            ProviderKind::Password => {}
        }
    }

    /// The tier authorization decisions should use: a paid tier whose
    /// expiry has passed counts as `free`.
    pub fn effective_subscription(&self, now: DateTime<Utc>) -> SubscriptionTier {
        match self.subscription_expires_at {
            Some(expires_at) if self.subscription > SubscriptionTier::Free && expires_at <= now => {
                SubscriptionTier::Free
            }
            _ => self.subscription,
        }
    }

    /// Convert to UserInfo for client consumption.
    pub fn to_info(&self) -> UserInfo {
        let mut providers = Vec::new();
        if self.telegram_id.is_some() {
            providers.push(ProviderKind::Telegram);
        }
        if self.google_id.is_some() {
            providers.push(ProviderKind::Google);
        }
        if self.github_id.is_some() {
            providers.push(ProviderKind::Github);
        }
        if self.password_hash.is_some() {
            providers.push(ProviderKind::Password);
        }

        UserInfo {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
            description: self.description.clone(),
            role: self.role,
            subscription: self.effective_subscription(Utc::now()),
            providers,
        }
    }
}

/// User information safe to send to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub description: Option<String>,
    pub role: UserRole,
    pub subscription: SubscriptionTier,
    pub providers: Vec<ProviderKind>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn role_order_is_strict() {
        assert!(UserRole::User < UserRole::Mentor);
        assert!(UserRole::Mentor < UserRole::Admin);
        assert!(UserRole::Mentor >= UserRole::User);
        assert!(!(UserRole::User >= UserRole::Admin));
    }

    #[test]
    fn subscription_order_is_strict() {
        assert!(SubscriptionTier::Free < SubscriptionTier::Pro);
        assert!(SubscriptionTier::Pro < SubscriptionTier::Team);
        assert!(SubscriptionTier::Team < SubscriptionTier::Enterprise);
        // The entry tier satisfies nothing above itself.
        assert!(!(SubscriptionTier::Free >= SubscriptionTier::Pro));
    }

    #[test]
    fn legacy_trial_rows_parse_as_free() {
        assert_eq!(SubscriptionTier::parse("trial"), SubscriptionTier::Free);
    }

    #[test]
    fn expired_paid_tier_reads_as_free() {
        let now = Utc::now();
        let mut user = test_user();
        user.subscription = SubscriptionTier::Pro;

        user.subscription_expires_at = None;
        assert_eq!(user.effective_subscription(now), SubscriptionTier::Pro);

        user.subscription_expires_at = Some(now + Duration::days(1));
        assert_eq!(user.effective_subscription(now), SubscriptionTier::Pro);

        user.subscription_expires_at = Some(now - Duration::days(1));
        assert_eq!(user.effective_subscription(now), SubscriptionTier::Free);
    }

    #[test]
    fn info_omits_secrets_and_lists_links() {
        let mut user = test_user();
        user.github_id = Some("octocat".into());
        user.password_hash = Some("$argon2id$...".into());

        let info = user.to_info();
        assert_eq!(info.id, user.id);
        assert_eq!(
            info.providers,
            vec![ProviderKind::Github, ProviderKind::Password]
        );
    }

    fn test_user() -> User {
        let now = Utc::now();
        User {
            id: 1,
            name: "Anna".into(),
            email: None,
            username: None,
            avatar_url: None,
            description: None,
            telegram_id: None,
            google_id: None,
            github_id: None,
            password_hash: None,
            role: UserRole::User,
            subscription: SubscriptionTier::Free,
            subscription_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
