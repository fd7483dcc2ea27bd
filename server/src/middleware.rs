//! # Authorization gate
//!
//! [`CurrentUser`] is an extractor: it pulls the bearer token from the
//! `Authorization` header (preferred) or the `access_token` cookie (only
//! when the header is absent), validates it, requires the kind to be
//! `access`, and exposes `(id, role, subscription)` to the handler. Any
//! validation failure is a 401 that reveals nothing about which part
//! failed beyond the stable error code.
//!
//! Role and subscription gates compare against strict total orders:
//! `user < mentor < admin` and `free < pro < team < enterprise`. A role or
//! tier passes any requirement at or below it; nothing is a wildcard.

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use api::token::TokenKind;
use api::{SubscriptionTier, UserRole};

use crate::error::ApiError;
use crate::state::AppState;

const ACCESS_COOKIE: &str = "access_token";

/// The authenticated caller, attached per request.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: i64,
    pub role: UserRole,
    pub subscription: SubscriptionTier,
}

impl CurrentUser {
    /// Pass iff the caller's role is at least `min`.
    pub fn require_role(&self, min: UserRole) -> Result<(), ApiError> {
        if self.role >= min {
            Ok(())
        } else {
            Err(ApiError::forbidden("insufficient permissions"))
        }
    }

    /// Pass iff the caller's subscription tier is at least `min`.
    pub fn require_subscription(&self, min: SubscriptionTier) -> Result<(), ApiError> {
        if self.subscription >= min {
            Ok(())
        } else {
            Err(ApiError::payment_required("subscription required"))
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("authorization required"))?;

        let claims = state.auth.issuer().validate(&token).map_err(ApiError::from)?;
        if claims.kind != TokenKind::Access {
            return Err(ApiError::unauthorized("access token required"));
        }

        Ok(CurrentUser {
            id: claims.sub,
            role: claims.role.unwrap_or(UserRole::User),
            subscription: claims.subscription.unwrap_or(SubscriptionTier::Free),
        })
    }
}

/// Bearer header first; the cookie counts only when the header is absent.
fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        return value.strip_prefix("Bearer ").map(str::to_string);
    }
    cookie_value(headers, ACCESS_COOKIE)
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(cookies) = header.to_str() else {
            continue;
        };
        for pair in cookies.split(';') {
            if let Some((key, value)) = pair.trim().split_once('=') {
                if key == name && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_static("Bearer header-token"),
        );
        headers.insert(
            COOKIE,
            HeaderValue::from_static("access_token=cookie-token"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("header-token"));

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; access_token=cookie-token"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("cookie-token"));

        // A malformed Authorization header does not fall back to cookies.
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));
        headers.insert(
            COOKIE,
            HeaderValue::from_static("access_token=cookie-token"),
        );
        assert_eq!(token_from_headers(&headers), None);
    }

    #[test]
    fn role_gate_follows_the_hierarchy() {
        let mentor = CurrentUser {
            id: 1,
            role: UserRole::Mentor,
            subscription: SubscriptionTier::Free,
        };
        assert!(mentor.require_role(UserRole::User).is_ok());
        assert!(mentor.require_role(UserRole::Mentor).is_ok());
        assert!(mentor.require_role(UserRole::Admin).is_err());
    }

    #[test]
    fn free_tier_satisfies_only_free() {
        let free = CurrentUser {
            id: 1,
            role: UserRole::User,
            subscription: SubscriptionTier::Free,
        };
        assert!(free.require_subscription(SubscriptionTier::Free).is_ok());
        assert!(free.require_subscription(SubscriptionTier::Pro).is_err());
        assert!(free.require_subscription(SubscriptionTier::Team).is_err());

        let team = CurrentUser {
            id: 1,
            role: UserRole::User,
            subscription: SubscriptionTier::Team,
        };
        assert!(team.require_subscription(SubscriptionTier::Pro).is_ok());
        assert!(team
            .require_subscription(SubscriptionTier::Enterprise)
            .is_err());
    }
}
