//! # Telegram login widget verification
//!
//! The widget posts a signed payload; the signature is an HMAC-SHA256 over
//! a canonical check-string, keyed with `SHA-256(bot_token)`:
//!
//! 1. Every field except `hash` is rendered as a `key=value` line (optional
//!    fields only when non-empty).
//! 2. The lines are sorted lexicographically and joined with `\n`.
//! 3. `HMAC-SHA256(SHA-256(bot_token), check_string)` must equal `hash`.
//!
//! The comparison runs in constant time via [`Mac::verify_slice`]. Payloads
//! older than a day are rejected even when correctly signed.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{AuthError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Widget payloads expire after one day.
pub const MAX_AUTH_AGE_SECS: i64 = 86_400;

/// Signed payload posted by the Telegram login widget.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramAuthData {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub auth_date: i64,
    #[serde(default)]
    pub hash: String,
}

impl TelegramAuthData {
    /// Full display name: first name, plus last name when present.
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// Verifies widget payloads against the bot token's derived secret.
pub struct TelegramVerifier {
    secret: [u8; 32],
}

impl TelegramVerifier {
    pub fn new(bot_token: &str) -> Self {
        Self {
            secret: Sha256::digest(bot_token.as_bytes()).into(),
        }
    }

    pub fn verify(&self, data: &TelegramAuthData) -> Result<()> {
        self.verify_at(data, Utc::now())
    }

    /// Verify against an explicit clock.
    pub fn verify_at(&self, data: &TelegramAuthData, now: DateTime<Utc>) -> Result<()> {
        if data.hash.is_empty() {
            return Err(AuthError::MissingField("hash"));
        }
        if data.id == 0 {
            return Err(AuthError::MissingField("id"));
        }

        let given = hex::decode(&data.hash).map_err(|_| AuthError::InvalidSignature)?;
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("hmac accepts any key length");
        mac.update(check_string(data).as_bytes());
        mac.verify_slice(&given)
            .map_err(|_| AuthError::InvalidSignature)?;

        if now.timestamp() - data.auth_date > MAX_AUTH_AGE_SECS {
            return Err(AuthError::ExpiredAssertion);
        }

        Ok(())
    }
}

/// Canonical check-string: sorted `key=value` lines joined by `\n`.
fn check_string(data: &TelegramAuthData) -> String {
    let mut pairs = vec![
        format!("auth_date={}", data.auth_date),
        format!("first_name={}", data.first_name),
        format!("id={}", data.id),
    ];

    if let Some(last_name) = data.last_name.as_deref().filter(|s| !s.is_empty()) {
        pairs.push(format!("last_name={last_name}"));
    }
    if let Some(photo_url) = data.photo_url.as_deref().filter(|s| !s.is_empty()) {
        pairs.push(format!("photo_url={photo_url}"));
    }
    if let Some(username) = data.username.as_deref().filter(|s| !s.is_empty()) {
        pairs.push(format!("username={username}"));
    }

    pairs.sort();
    pairs.join("\n")
}

#[cfg(test)]
pub(crate) fn sign(data: &TelegramAuthData, bot_token: &str) -> String {
    let secret: [u8; 32] = Sha256::digest(bot_token.as_bytes()).into();
    let mut mac = HmacSha256::new_from_slice(&secret).unwrap();
    mac.update(check_string(data).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT_TOKEN: &str = "12345:test-bot-token";

    fn payload(now: DateTime<Utc>) -> TelegramAuthData {
        let mut data = TelegramAuthData {
            id: 123,
            first_name: "Anna".into(),
            username: Some("anna".into()),
            auth_date: now.timestamp(),
            ..Default::default()
        };
        data.hash = sign(&data, BOT_TOKEN);
        data
    }

    #[test]
    fn valid_payload_verifies() {
        let now = Utc::now();
        let verifier = TelegramVerifier::new(BOT_TOKEN);
        assert!(verifier.verify_at(&payload(now), now).is_ok());
    }

    #[test]
    fn any_flipped_hash_byte_fails() {
        let now = Utc::now();
        let verifier = TelegramVerifier::new(BOT_TOKEN);
        let mut data = payload(now);

        let mut bytes = hex::decode(&data.hash).unwrap();
        bytes[0] ^= 0x01;
        data.hash = hex::encode(bytes);

        let err = verifier.verify_at(&data, now).unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature));
    }

    #[test]
    fn wrong_bot_token_fails() {
        let now = Utc::now();
        let verifier = TelegramVerifier::new("other:token");
        let err = verifier.verify_at(&payload(now), now).unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature));
    }

    #[test]
    fn day_old_payload_is_rejected() {
        let now = Utc::now();
        let mut data = TelegramAuthData {
            id: 123,
            first_name: "Anna".into(),
            auth_date: now.timestamp() - MAX_AUTH_AGE_SECS - 1,
            ..Default::default()
        };
        data.hash = sign(&data, BOT_TOKEN);

        let verifier = TelegramVerifier::new(BOT_TOKEN);
        let err = verifier.verify_at(&data, now).unwrap_err();
        assert!(matches!(err, AuthError::ExpiredAssertion));

        // Exactly at the boundary is still accepted.
        let mut data = TelegramAuthData {
            id: 123,
            first_name: "Anna".into(),
            auth_date: now.timestamp() - MAX_AUTH_AGE_SECS,
            ..Default::default()
        };
        data.hash = sign(&data, BOT_TOKEN);
        assert!(verifier.verify_at(&data, now).is_ok());
    }

    #[test]
    fn missing_fields_are_reported() {
        let now = Utc::now();
        let verifier = TelegramVerifier::new(BOT_TOKEN);

        let mut data = payload(now);
        data.hash = String::new();
        assert!(matches!(
            verifier.verify_at(&data, now),
            Err(AuthError::MissingField("hash"))
        ));

        let mut data = TelegramAuthData {
            id: 0,
            first_name: "Anna".into(),
            auth_date: now.timestamp(),
            ..Default::default()
        };
        data.hash = sign(&data, BOT_TOKEN);
        assert!(matches!(
            verifier.verify_at(&data, now),
            Err(AuthError::MissingField("id"))
        ));
    }

    #[test]
    fn optional_fields_change_the_signature() {
        let now = Utc::now();
        let verifier = TelegramVerifier::new(BOT_TOKEN);

        let mut data = payload(now);
        data.photo_url = Some("https://t.me/i/userpic/anna.jpg".into());
        // Signed without photo_url, so verification must fail.
        let err = verifier.verify_at(&data, now).unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature));

        data.hash = sign(&data, BOT_TOKEN);
        assert!(verifier.verify_at(&data, now).is_ok());
    }
}
