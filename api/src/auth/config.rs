//! OAuth provider endpoint configuration.

use oauth2::url::ParseError;
use oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, TokenUrl};

/// OAuth provider configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
    pub auth_url: AuthUrl,
    pub token_url: TokenUrl,
    pub redirect_url: RedirectUrl,
}

impl OAuthConfig {
    /// GitHub endpoints; the callback lands at
    /// `{public_base}/auth/github/callback`.
    pub fn github(
        client_id: &str,
        client_secret: &str,
        public_base: &str,
    ) -> Result<Self, ParseError> {
        Ok(Self {
            client_id: ClientId::new(client_id.to_string()),
            client_secret: ClientSecret::new(client_secret.to_string()),
            auth_url: AuthUrl::new("https://github.com/login/oauth/authorize".to_string())?,
            token_url: TokenUrl::new("https://github.com/login/oauth/access_token".to_string())?,
            redirect_url: RedirectUrl::new(format!("{public_base}/auth/github/callback"))?,
        })
    }

    /// Google endpoints; the callback lands at
    /// `{public_base}/auth/google/callback`.
    pub fn google(
        client_id: &str,
        client_secret: &str,
        public_base: &str,
    ) -> Result<Self, ParseError> {
        Ok(Self {
            client_id: ClientId::new(client_id.to_string()),
            client_secret: ClientSecret::new(client_secret.to_string()),
            auth_url: AuthUrl::new("https://accounts.google.com/o/oauth2/v2/auth".to_string())?,
            token_url: TokenUrl::new("https://oauth2.googleapis.com/token".to_string())?,
            redirect_url: RedirectUrl::new(format!("{public_base}/auth/google/callback"))?,
        })
    }
}
