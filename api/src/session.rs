//! # Refresh session store — server-side revocation registry
//!
//! Every issued refresh token has a row here, keyed by its SHA-256
//! fingerprint; the raw token is never persisted. The registry is what
//! makes refresh tokens revocable: logout revokes one row, "log out
//! everywhere" revokes all of a user's rows, and rotation revokes the row
//! of the token it replaces.
//!
//! [`SessionStore::find_active`] never yields a revoked session. It
//! distinguishes a revoked row ([`AuthError::SessionRevoked`] — the
//! signature of a rotated token being replayed) from a missing or expired
//! one ([`AuthError::SessionNotFound`]).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{FromRow, PgPool};

use crate::error::{AuthError, Result};

/// SHA-256 fingerprint of a token, hex-encoded.
pub fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// One refresh session (one device).
#[derive(Debug, Clone, FromRow)]
pub struct RefreshSession {
    pub id: i64,
    pub user_id: i64,
    pub refresh_token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Async interface over the session registry.
pub trait SessionStore: Send + Sync {
    fn create(
        &self,
        user_id: i64,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// The active session for a token. Errors with `SessionRevoked` for a
    /// revoked row, `SessionNotFound` for a missing or expired one.
    fn find_active(
        &self,
        refresh_token: &str,
    ) -> impl std::future::Future<Output = Result<RefreshSession>> + Send;

    /// Revoke the session for a token. Idempotent: revoking an unknown or
    /// already-revoked token succeeds.
    fn revoke(
        &self,
        refresh_token: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Revoke every session of a user. Returns how many were affected.
    fn revoke_all(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// Active sessions of a user, newest first.
    fn active_for_user(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<RefreshSession>>> + Send;

    /// Delete expired and revoked rows. Returns how many were removed.
    fn sweep_expired(&self) -> impl std::future::Future<Output = Result<u64>> + Send;
}

fn classify(session: Option<RefreshSession>, now: DateTime<Utc>) -> Result<RefreshSession> {
    let Some(session) = session else {
        return Err(AuthError::SessionNotFound);
    };
    if session.revoked_at.is_some() {
        return Err(AuthError::SessionRevoked);
    }
    if session.expires_at <= now {
        return Err(AuthError::SessionNotFound);
    }
    Ok(session)
}

/// PostgreSQL-backed session store.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SessionStore for PgSessionStore {
    async fn create(
        &self,
        user_id: i64,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO auth_sessions (user_id, refresh_token_hash, expires_at) \
             VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(fingerprint(refresh_token))
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_active(&self, refresh_token: &str) -> Result<RefreshSession> {
        let session: Option<RefreshSession> = sqlx::query_as(
            "SELECT id, user_id, refresh_token_hash, expires_at, created_at, revoked_at \
             FROM auth_sessions WHERE refresh_token_hash = $1",
        )
        .bind(fingerprint(refresh_token))
        .fetch_optional(&self.pool)
        .await?;
        classify(session, Utc::now())
    }

    async fn revoke(&self, refresh_token: &str) -> Result<()> {
        sqlx::query(
            "UPDATE auth_sessions SET revoked_at = now() \
             WHERE refresh_token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(fingerprint(refresh_token))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_all(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE auth_sessions SET revoked_at = now() \
             WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn active_for_user(&self, user_id: i64) -> Result<Vec<RefreshSession>> {
        let sessions = sqlx::query_as(
            "SELECT id, user_id, refresh_token_hash, expires_at, created_at, revoked_at \
             FROM auth_sessions \
             WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > now() \
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    async fn sweep_expired(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM auth_sessions WHERE expires_at < now() OR revoked_at IS NOT NULL",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// In-memory session store for tests and local development.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<HashMap<String, RefreshSession>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    async fn create(
        &self,
        user_id: i64,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap();
        let hash = fingerprint(refresh_token);
        let id = sessions.len() as i64 + 1;
        sessions.insert(
            hash.clone(),
            RefreshSession {
                id,
                user_id,
                refresh_token_hash: hash,
                expires_at,
                created_at: Utc::now(),
                revoked_at: None,
            },
        );
        Ok(())
    }

    async fn find_active(&self, refresh_token: &str) -> Result<RefreshSession> {
        let session = self
            .sessions
            .lock()
            .unwrap()
            .get(&fingerprint(refresh_token))
            .cloned();
        classify(session, Utc::now())
    }

    async fn revoke(&self, refresh_token: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.get_mut(&fingerprint(refresh_token)) {
            if session.revoked_at.is_none() {
                session.revoked_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn revoke_all(&self, user_id: i64) -> Result<u64> {
        let mut sessions = self.sessions.lock().unwrap();
        let mut revoked = 0;
        for session in sessions.values_mut() {
            if session.user_id == user_id && session.revoked_at.is_none() {
                session.revoked_at = Some(Utc::now());
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn active_for_user(&self, user_id: i64) -> Result<Vec<RefreshSession>> {
        let now = Utc::now();
        let mut sessions: Vec<RefreshSession> = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id && s.revoked_at.is_none() && s.expires_at > now)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn sweep_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| s.revoked_at.is_none() && s.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}
