//! # OAuth state registry — short-lived CSRF nonces
//!
//! Authorization redirects carry a random `state` that the callback must
//! return. Entries live in a single shared map for ten minutes and are
//! consumed exactly once: [`consume`](OAuthStateStore::consume) removes the
//! entry no matter the outcome, so a replayed state fails even inside the
//! TTL window. A sweeper task evicts abandoned entries; it is started
//! explicitly and owns a shutdown handle so tests and graceful shutdown can
//! terminate it deterministically.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

use crate::models::ProviderKind;

const STATE_TTL_SECS: i64 = 600;

/// Sweeper cadence used by the server.
pub const SWEEP_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone)]
struct StateEntry {
    provider: ProviderKind,
    expires_at: DateTime<Utc>,
}

/// Concurrent registry of pending OAuth states.
pub struct OAuthStateStore {
    entries: RwLock<HashMap<String, StateEntry>>,
    ttl: Duration,
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuthStateStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(STATE_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Generate and register a fresh state for `provider`.
    pub fn issue(&self, provider: ProviderKind) -> String {
        self.issue_at(provider, Utc::now())
    }

    pub fn issue_at(&self, provider: ProviderKind, now: DateTime<Utc>) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let state = URL_SAFE_NO_PAD.encode(bytes);

        self.entries.write().unwrap().insert(
            state.clone(),
            StateEntry {
                provider,
                expires_at: now + self.ttl,
            },
        );
        state
    }

    /// Validate and consume a state. True iff it existed, belonged to
    /// `provider`, and had not expired. The entry is removed either way.
    pub fn consume(&self, state: &str, provider: ProviderKind) -> bool {
        self.consume_at(state, provider, Utc::now())
    }

    pub fn consume_at(&self, state: &str, provider: ProviderKind, now: DateTime<Utc>) -> bool {
        let entry = self.entries.write().unwrap().remove(state);
        match entry {
            Some(entry) => entry.provider == provider && now < entry.expires_at,
            None => false,
        }
    }

    /// Drop expired entries, returning how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    /// Spawn the periodic sweeper. The returned handle stops it.
    pub fn start_sweeper(self: Arc<Self>, interval: std::time::Duration) -> StateSweeper {
        let store = self;
        let (shutdown, mut signal) = tokio::sync::watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let swept = store.sweep();
                        if swept > 0 {
                            tracing::debug!(swept, "expired oauth states removed");
                        }
                    }
                    _ = signal.changed() => break,
                }
            }
        });
        StateSweeper { shutdown, handle }
    }
}

/// Handle for the background sweeper task.
pub struct StateSweeper {
    shutdown: tokio::sync::watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl StateSweeper {
    /// Stop the sweeper and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_is_single_use() {
        let store = OAuthStateStore::new();
        let state = store.issue(ProviderKind::Github);

        assert!(store.consume(&state, ProviderKind::Github));
        // Second consume fails even inside the TTL window.
        assert!(!store.consume(&state, ProviderKind::Github));
    }

    #[test]
    fn provider_must_match_and_mismatch_still_consumes() {
        let store = OAuthStateStore::new();
        let state = store.issue(ProviderKind::Github);

        assert!(!store.consume(&state, ProviderKind::Google));
        assert!(!store.consume(&state, ProviderKind::Github));
    }

    #[test]
    fn expired_states_fail_and_sweep_removes_them() {
        let store = OAuthStateStore::new();
        let now = Utc::now();
        let state = store.issue_at(ProviderKind::Google, now);

        let later = now + Duration::seconds(STATE_TTL_SECS + 1);
        assert!(!store.consume_at(&state, ProviderKind::Google, later));

        let other = store.issue_at(ProviderKind::Google, now);
        assert_eq!(store.sweep_at(later), 1);
        assert!(!store.consume_at(&other, ProviderKind::Google, later));
    }

    #[test]
    fn unknown_state_is_rejected() {
        let store = OAuthStateStore::new();
        assert!(!store.consume("nope", ProviderKind::Github));
    }

    #[tokio::test]
    async fn sweeper_stops_on_demand() {
        let store = Arc::new(OAuthStateStore::new());
        let sweeper = store.start_sweeper(std::time::Duration::from_millis(10));
        sweeper.stop().await;
    }
}
