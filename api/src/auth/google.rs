//! # Google OAuth 2.0 verifier
//!
//! Implements the Google Authorization Code flow. The structure mirrors
//! [`super::github`] but targets Google's endpoints and scopes, and the
//! userinfo response carries the email verification flag the resolver
//! needs before it will merge accounts by email.
//!
//! As with GitHub, the provider round-trips run on a detached task so a
//! disconnected client cannot leave a half-finished code exchange behind.

use std::sync::Arc;
use std::time::Duration;

use oauth2::basic::BasicClient;
use oauth2::{AuthorizationCode, CsrfToken, EndpointNotSet, EndpointSet, Scope, TokenResponse};
use serde::Deserialize;

use crate::error::{AuthError, Result};
use crate::models::ProviderKind;

use super::config::OAuthConfig;
use super::state::OAuthStateStore;

const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Verified Google identity claim.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub verified_email: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
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

/// Google OAuth verifier.
pub struct GoogleOAuth {
    config: OAuthConfig,
    states: Arc<OAuthStateStore>,
    http: reqwest::Client,
}

impl GoogleOAuth {
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
        let state = self.states.issue(ProviderKind::Google);
        let (auth_url, _) = self
            .create_client()
            .authorize_url(|| CsrfToken::new(state))
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .url();
        auth_url.to_string()
    }

    /// Exchange the callback's code for a verified profile.
    pub async fn exchange(&self, state: &str, code: &str) -> Result<GoogleProfile> {
        if !self.states.consume(state, ProviderKind::Google) {
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

            let profile = get_userinfo(&http, access_token).await?;
            tracing::debug!(google_id = %profile.id, "google profile fetched");
            Ok(profile)
        });

        task.await
            .map_err(|e| AuthError::Internal(format!("exchange task failed: {e}")))?
    }
}

/// Fetch the userinfo document. Transport failures are retried once
/// (idempotent read); an error status from the API is not.
async fn get_userinfo(http: &reqwest::Client, access_token: &str) -> Result<GoogleProfile> {
    let mut last_err = AuthError::Provider(format!("{USERINFO_URL} unreachable"));
    for _ in 0..2 {
        let response = match http
            .get(USERINFO_URL)
            .header("Authorization", format!("Bearer {access_token}"))
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
                "{USERINFO_URL} returned {}",
                response.status()
            )));
        }
        return response
            .json::<GoogleProfile>()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()));
    }
    Err(last_err)
}
