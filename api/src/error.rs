//! Error taxonomy for the identity and token subsystem.
//!
//! Every failure a caller can act on has its own variant with a stable
//! machine-readable [`code`](AuthError::code). The HTTP layer maps variants
//! to status codes; this crate stays transport-agnostic.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("authorization data is too old")]
    ExpiredAssertion,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid or expired oauth state")]
    InvalidState,

    #[error("provider account already linked to another user")]
    ProviderConflict,

    #[error("token expired")]
    TokenExpired,

    #[error("token malformed")]
    TokenMalformed,

    #[error("session revoked")]
    SessionRevoked,

    #[error("session not found")]
    SessionNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("email already in use")]
    DuplicateEmail,

    #[error("username already in use")]
    DuplicateUsername,

    #[error("{0} is not configured")]
    ProviderNotConfigured(&'static str),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable error code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidSignature => "INVALID_SIGNATURE",
            AuthError::ExpiredAssertion => "EXPIRED_ASSERTION",
            AuthError::MissingField(_) => "MISSING_FIELD",
            AuthError::InvalidState => "INVALID_STATE",
            AuthError::ProviderConflict => "PROVIDER_CONFLICT",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenMalformed => "TOKEN_MALFORMED",
            AuthError::SessionRevoked => "SESSION_REVOKED",
            AuthError::SessionNotFound => "SESSION_NOT_FOUND",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::DuplicateEmail => "DUPLICATE_EMAIL",
            AuthError::DuplicateUsername => "DUPLICATE_USERNAME",
            AuthError::ProviderNotConfigured(_) => "PROVIDER_NOT_CONFIGURED",
            AuthError::Provider(_) => "PROVIDER_ERROR",
            AuthError::Database(_) => "DATABASE_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
