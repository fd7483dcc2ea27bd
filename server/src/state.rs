//! Shared application state.

use std::sync::Arc;

use anyhow::Context as _;
use chrono::Duration;
use sqlx::PgPool;

use api::auth::{GitHubOAuth, GoogleOAuth, OAuthConfig, OAuthStateStore, TelegramVerifier};
use api::session::PgSessionStore;
use api::store::PgUserStore;
use api::token::TokenIssuer;
use api::AuthService;

use crate::settings::Settings;

pub type Service = AuthService<PgUserStore, PgSessionStore>;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Service>,
    pub oauth_states: Arc<OAuthStateStore>,
}

impl AppState {
    pub fn new(settings: &Settings, pool: PgPool) -> anyhow::Result<Self> {
        let issuer = TokenIssuer::with_ttls(
            &settings.auth.secret,
            Duration::minutes(settings.auth.access),
            Duration::days(settings.auth.refresh),
        );
        let oauth_states = Arc::new(OAuthStateStore::new());

        let mut auth = AuthService::new(
            PgUserStore::new(pool.clone()),
            PgSessionStore::new(pool),
            issuer,
        );

        if !settings.telegram.token.is_empty() {
            auth = auth.with_telegram(TelegramVerifier::new(&settings.telegram.token));
            tracing::info!("telegram login enabled");
        }
        if settings.github.configured() {
            let config = OAuthConfig::github(
                &settings.github.id,
                &settings.github.secret,
                &settings.auth.redirect,
            )
            .context("invalid github oauth configuration")?;
            auth = auth.with_github(GitHubOAuth::new(config, Arc::clone(&oauth_states)));
            tracing::info!("github login enabled");
        }
        if settings.google.configured() {
            let config = OAuthConfig::google(
                &settings.google.id,
                &settings.google.secret,
                &settings.auth.redirect,
            )
            .context("invalid google oauth configuration")?;
            auth = auth.with_google(GoogleOAuth::new(config, Arc::clone(&oauth_states)));
            tracing::info!("google login enabled");
        }

        Ok(Self {
            auth: Arc::new(auth),
            oauth_states,
        })
    }
}
