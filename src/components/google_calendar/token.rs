use super::models::{Credentials, TokenResponse};
use crate::config::{Config, CALENDAR_SCOPES};
use crate::error::{auth_exchange_error, config_error, RelayResult};
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

/// OAuth2 client for the Google identity provider
#[derive(Clone)]
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_url: Url,
    token_url: String,
    client: Client,
}

impl OAuthClient {
    /// Create a client from the relay configuration
    pub fn from_config(config: &Config) -> RelayResult<Self> {
        let auth_url = Url::parse(&config.auth_url)
            .map_err(|e| config_error(&format!("Invalid authorization URL: {}", e)))?;

        Ok(Self {
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.google_redirect_uri.clone(),
            auth_url,
            token_url: config.token_url.clone(),
            client: Client::new(),
        })
    }

    /// Build the consent page URL, requesting offline access and calendar scopes
    pub fn authorization_url(&self) -> Url {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("access_type", "offline")
            .append_pair("scope", &CALENDAR_SCOPES.join(" "))
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri);
        url
    }

    /// Exchange a one-time authorization code for a token pair
    pub async fn exchange_code(&self, code: &str) -> RelayResult<Credentials> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self.request_token(&params).await?;
        info!("Authorization code exchanged for tokens");
        Ok(Credentials::from_token_response(response, Utc::now()))
    }

    /// Get a new access token using a refresh token.
    /// The returned credentials only carry a refresh token if Google issued a new one.
    pub async fn refresh(&self, refresh_token: &str) -> RelayResult<Credentials> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self.request_token(&params).await?;
        info!("Access token refreshed");
        Ok(Credentials::from_token_response(response, Utc::now()))
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> RelayResult<TokenResponse> {
        debug!("Requesting token from {}", self.token_url);

        let response = self
            .client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| auth_exchange_error(&format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(auth_exchange_error(&format!(
                "HTTP {} - {}",
                status, error_body
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| auth_exchange_error(&format!("Failed to parse token response: {}", e)))
    }
}
