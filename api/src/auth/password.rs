//! # Password hashing and verification — Argon2id
//!
//! Provides the local (identifier + password) authentication path:
//!
//! - [`hash_password`] — generates a random salt via [`OsRng`], hashes the
//!   plaintext with the default Argon2id parameters, and returns a
//!   PHC-format string (e.g. `$argon2id$v=19$m=19456,t=2,p=1$...`) for the
//!   `password_hash` column.
//! - [`verify_password`] — parses a PHC-format hash and checks whether the
//!   provided plaintext matches.
//! - [`PasswordVerifier`] — looks a user up by email or username and
//!   verifies the password, collapsing every failure into
//!   [`AuthError::InvalidCredentials`] so responses never reveal whether
//!   the identifier exists.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier as _, SaltString},
    Argon2,
};

use crate::error::{AuthError, Result};
use crate::models::User;
use crate::store::UserStore;

/// Hash a password using Argon2id. Returns a PHC-format string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Internal(format!("failed to hash password: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a password against a PHC-format hash string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AuthError::Internal(format!("invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Validates password credentials against the user store.
pub struct PasswordVerifier<S> {
    store: S,
}

impl<S: UserStore> PasswordVerifier<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Verify an identifier/password pair. The identifier matches the
    /// user's email first, then their username.
    pub async fn verify(&self, identifier: &str, password: &str) -> Result<User> {
        let user = match self.store.find_by_email(identifier).await? {
            Some(user) => Some(user),
            None => self.store.find_by_username(identifier).await?,
        };
        let Some(user) = user else {
            return Err(AuthError::InvalidCredentials);
        };
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AuthError::InvalidCredentials);
        };
        if verify_password(password, hash)? {
            Ok(user)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryUserStore, NewUser};

    #[test]
    fn hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }

    #[tokio::test]
    async fn verify_matches_email_or_username() {
        let store = MemoryUserStore::new();
        store
            .create(NewUser {
                name: "Anna".into(),
                email: Some("a@x.com".into()),
                username: Some("anna".into()),
                password_hash: Some(hash_password("hunter2").unwrap()),
                ..Default::default()
            })
            .await
            .unwrap();

        let verifier = PasswordVerifier::new(store);
        assert!(verifier.verify("a@x.com", "hunter2").await.is_ok());
        assert!(verifier.verify("anna", "hunter2").await.is_ok());

        let err = verifier.verify("a@x.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = verifier.verify("nobody", "hunter2").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }
}
