//! # Token issuer — signed access/refresh pairs
//!
//! Both tokens are JWTs signed with HMAC-SHA256 under one shared secret.
//! The algorithm is pinned on verification: only HS256 is accepted, so a
//! token claiming any other algorithm (including `none`) is rejected
//! outright. Expiry is checked with zero leeway.
//!
//! Access tokens embed the subject, role, and effective subscription so
//! authorization needs no database lookup. Refresh tokens carry only the
//! subject and kind; a leaked refresh token reveals nothing about the
//! account's privileges. Every token gets a unique `jti`.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::models::{SubscriptionTier, User, UserRole};

const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;
const DEFAULT_REFRESH_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by both token kinds. Role and subscription are present
/// only on access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    #[serde(rename = "token_type")]
    pub kind: TokenKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionTier>,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// A freshly minted access + refresh pair.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Mints and validates signed token pairs.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        Self::with_ttls(
            secret,
            Duration::minutes(DEFAULT_ACCESS_TTL_MINUTES),
            Duration::days(DEFAULT_REFRESH_TTL_DAYS),
        )
    }

    pub fn with_ttls(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        // Single-algorithm allow-list; no leeway on expiry.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Mint an access + refresh pair for `user`.
    pub fn mint(&self, user: &User) -> Result<TokenPair> {
        self.mint_at(user, Utc::now())
    }

    pub fn mint_at(&self, user: &User, now: DateTime<Utc>) -> Result<TokenPair> {
        let access = Claims {
            sub: user.id,
            kind: TokenKind::Access,
            role: Some(user.role),
            subscription: Some(user.effective_subscription(now)),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let refresh = Claims {
            sub: user.id,
            kind: TokenKind::Refresh,
            role: None,
            subscription: None,
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        Ok(TokenPair {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Verify signature and expiry, returning the claims.
    pub fn validate(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::TokenMalformed,
            })
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("failed to sign token: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriptionTier;

    const SECRET: &str = "test-signing-secret";

    fn test_user() -> User {
        let now = Utc::now();
        User {
            id: 42,
            name: "Anna".into(),
            email: None,
            username: None,
            avatar_url: None,
            description: None,
            telegram_id: None,
            google_id: None,
            github_id: None,
            password_hash: None,
            role: UserRole::Mentor,
            subscription: SubscriptionTier::Pro,
            subscription_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn round_trip_recovers_minted_claims() {
        let issuer = TokenIssuer::new(SECRET);
        let pair = issuer.mint(&test_user()).unwrap();

        let access = issuer.validate(&pair.access_token).unwrap();
        assert_eq!(access.sub, 42);
        assert_eq!(access.kind, TokenKind::Access);
        assert_eq!(access.role, Some(UserRole::Mentor));
        assert_eq!(access.subscription, Some(SubscriptionTier::Pro));

        let refresh = issuer.validate(&pair.refresh_token).unwrap();
        assert_eq!(refresh.sub, 42);
        assert_eq!(refresh.kind, TokenKind::Refresh);
        // Minimal claim surface on the long-lived token.
        assert_eq!(refresh.role, None);
        assert_eq!(refresh.subscription, None);

        assert_ne!(access.jti, refresh.jti);
    }

    #[test]
    fn expired_subscription_mints_as_free() {
        let issuer = TokenIssuer::new(SECRET);
        let mut user = test_user();
        user.subscription_expires_at = Some(Utc::now() - Duration::days(1));

        let pair = issuer.mint(&user).unwrap();
        let claims = issuer.validate(&pair.access_token).unwrap();
        assert_eq!(claims.subscription, Some(SubscriptionTier::Free));
    }

    #[test]
    fn wrong_secret_is_an_invalid_signature() {
        let issuer = TokenIssuer::new(SECRET);
        let other = TokenIssuer::new("other-secret");
        let pair = issuer.mint(&test_user()).unwrap();

        let err = other.validate(&pair.access_token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature));
    }

    #[test]
    fn expiry_and_malformed_are_distinct_errors() {
        let issuer = TokenIssuer::with_ttls(
            SECRET,
            Duration::seconds(-10),
            Duration::seconds(-10),
        );
        let pair = issuer.mint(&test_user()).unwrap();
        let err = issuer.validate(&pair.access_token).unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));

        let issuer = TokenIssuer::new(SECRET);
        let err = issuer.validate("not-a-token").unwrap_err();
        assert!(matches!(err, AuthError::TokenMalformed));
    }

    #[test]
    fn unsigned_tokens_are_rejected() {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine as _;

        let issuer = TokenIssuer::new(SECRET);
        let pair = issuer.mint(&test_user()).unwrap();

        // Re-assemble the token with alg=none and no signature.
        let payload = pair.access_token.split('.').nth(1).unwrap();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let forged = format!("{header}.{payload}.");

        assert!(issuer.validate(&forged).is_err());
    }
}
