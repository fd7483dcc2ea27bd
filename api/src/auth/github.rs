//! # GitHub OAuth 2.0 verifier
//!
//! Implements the GitHub Authorization Code flow.
//!
//! ## Types
//!
//! - [`GithubProfile`] — the decoded identity claim, deserialized straight
//!   from the GitHub REST API (`/user`).
//! - [`ConfiguredClient`] — a fully-typed `oauth2::Client` alias with auth
//!   and token endpoints set.
//! - [`GitHubOAuth`] — the public verifier wrapping an [`OAuthConfig`] and
//!   the shared [`OAuthStateStore`].
//!
//! ## Flow
//!
//! 1. **[`authorize_url`](GitHubOAuth::authorize_url)** — issues a fresh
//!    CSRF state and builds an authorization URL requesting the
//!    `user:email` and `read:user` scopes.
//!
//! 2. **[`exchange`](GitHubOAuth::exchange)** — called by the callback
//!    route. It:
//!    - Consumes the state from the registry (single use; provider and
//!      expiry are checked there).
//!    - Exchanges the authorization code for an access token. The code is
//!      single-use, so a failed exchange is never retried.
//!    - Fetches the profile from `api.github.com/user`; if no email is
//!      present, falls back to `/user/emails` and picks the primary
//!      verified address, then any verified one.
//!
//! The provider round-trips run on a detached task: a client that
//! disconnects mid-callback no longer persists anything, but the code
//! exchange still completes so the provider is not left with a dangling
//! authorization.

use std::sync::Arc;
use std::time::Duration;

use oauth2::basic::BasicClient;
use oauth2::{AuthorizationCode, CsrfToken, EndpointNotSet, EndpointSet, Scope, TokenResponse};
use serde::Deserialize;

use crate::error::{AuthError, Result};
use crate::models::ProviderKind;

use super::config::OAuthConfig;
use super::state::OAuthStateStore;

const USER_URL: &str = "https://api.github.com/user";
const EMAILS_URL: &str = "https://api.github.com/user/emails";
const USER_AGENT: &str = "pathlight";

/// Verified GitHub identity claim.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubProfile {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

/// GitHub email info from API.
#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// GitHub OAuth verifier.
pub struct GitHubOAuth {
    config: OAuthConfig,
    states: Arc<OAuthStateStore>,
    http: reqwest::Client,
}

impl GitHubOAuth {
    pub fn new(config: OAuthConfig, states: Arc<OAuthStateStore>) -> Self {
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self { config, states, http }
    }

    fn create_client(&self) -> ConfiguredClient {
        BasicClient::new(self.config.client_id.clone())
            .set_client_secret(self.config.client_secret.clone())
            .set_auth_uri(self.config.auth_url.clone())
            .set_token_uri(self.config.token_url.clone())
            .set_redirect_uri(self.config.redirect_url.clone())
    }

    /// Build the authorization URL, registering a CSRF state for it.
    pub fn authorize_url(&self) -> String {
        let state = self.states.issue(ProviderKind::Github);
        let (auth_url, _) = self
            .create_client()
            .authorize_url(|| CsrfToken::new(state))
            .add_scope(Scope::new("user:email".to_string()))
            .add_scope(Scope::new("read:user".to_string()))
            .url();
        auth_url.to_string()
    }

    /// Exchange the callback's code for a verified profile.
    pub async fn exchange(&self, state: &str, code: &str) -> Result<GithubProfile> {
        if !self.states.consume(state, ProviderKind::Github) {
            return Err(AuthError::InvalidState);
        }

        let client = self.create_client();
        let http = self.http.clone();
        let code = code.to_string();

        let task = tokio::spawn(async move {
            let token = client
                .exchange_code(AuthorizationCode::new(code))
                .request_async(&http)
                .await
                .map_err(|e| AuthError::Provider(format!("token exchange failed: {e}")))?;
            let access_token = token.access_token().secret();

            let mut profile: GithubProfile = get_json(&http, USER_URL, access_token).await?;

            if profile.email.as_deref().unwrap_or("").is_empty() {
                // A missing email is not fatal; the account may simply
                // hide it.
                profile.email = primary_email(&http, access_token).await.ok().flatten();
            }

            tracing::debug!(login = %profile.login, "github profile fetched");
            Ok(profile)
        });

        task.await
            .map_err(|e| AuthError::Internal(format!("exchange task failed: {e}")))?
    }
}

async fn primary_email(http: &reqwest::Client, access_token: &str) -> Result<Option<String>> {
    let emails: Vec<GitHubEmail> = get_json(http, EMAILS_URL, access_token).await?;
    Ok(emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.iter().find(|e| e.verified))
        .map(|e| e.email.clone()))
}

/// GET a JSON resource with the provider token. Transport failures are
/// retried once (the calls are idempotent reads); an error status from the
/// API is not.
async fn get_json<T: serde::de::DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    access_token: &str,
) -> Result<T> {
    let mut last_err = AuthError::Provider(format!("{url} unreachable"));
    for _ in 0..2 {
        let response = match http
            .get(url)
            .header("Authorization", format!("Bearer {access_token}"))
            .header("User-Agent", USER_AGENT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                last_err = AuthError::Provider(e.to_string());
                continue;
            }
        };
        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        return response
            .json::<T>()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()));
    }
    Err(last_err)
}
