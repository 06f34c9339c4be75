use crate::error::{config_error, env_error, RelayResult};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;

/// Default port the relay listens on
pub const DEFAULT_PORT: u16 = 3000;

/// Where the browser is sent after a successful sign-in
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";

/// Timezone attached to created events
pub const DEFAULT_TIMEZONE: &str = "Asia/Seoul";

/// Number of upcoming events returned by `/events`
pub const EVENTS_PAGE_SIZE: u32 = 10;

/// Scopes requested during the OAuth2 flow
pub const CALENDAR_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/calendar.events",
];

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

/// Optional overrides file
const CONFIG_FILE: &str = "config/relay.toml";

/// Main configuration structure for the relay
#[derive(Debug, Clone)]
pub struct Config {
    /// Google OAuth2 client ID
    pub google_client_id: String,
    /// Google OAuth2 client secret
    pub google_client_secret: String,
    /// Redirect URI registered with Google, pointing at `/oauth2callback`
    pub google_redirect_uri: String,
    /// Port to listen on
    pub port: u16,
    /// Front-end origin to return to after sign-in
    pub frontend_url: String,
    /// Timezone for created events
    pub timezone: String,
    /// OAuth2 authorization endpoint
    pub auth_url: String,
    /// OAuth2 token endpoint
    pub token_url: String,
    /// Calendar API base URL
    pub calendar_api_base: String,
}

/// Keys accepted in `config/relay.toml`
#[derive(Debug, Default, Deserialize)]
struct FileOverrides {
    port: Option<u16>,
    frontend_url: Option<String>,
    timezone: Option<String>,
}

impl Config {
    /// Create a config with the given client credentials and defaults for everything else
    pub fn new(client_id: &str, client_secret: &str, redirect_uri: &str) -> Self {
        Self {
            google_client_id: client_id.to_string(),
            google_client_secret: client_secret.to_string(),
            google_redirect_uri: redirect_uri.to_string(),
            port: DEFAULT_PORT,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            calendar_api_base: GOOGLE_CALENDAR_API.to_string(),
        }
    }

    /// Load configuration from environment and config file
    pub fn load() -> RelayResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let client_id = env::var("GOOGLE_CLIENT_ID").map_err(|_| env_error("GOOGLE_CLIENT_ID"))?;
        let client_secret =
            env::var("GOOGLE_CLIENT_SECRET").map_err(|_| env_error("GOOGLE_CLIENT_SECRET"))?;
        let redirect_uri =
            env::var("GOOGLE_REDIRECT_URI").map_err(|_| env_error("GOOGLE_REDIRECT_URI"))?;

        let mut config = Config::new(&client_id, &client_secret, &redirect_uri);

        if let Ok(content) = fs::read_to_string(CONFIG_FILE) {
            config.apply_file_overrides(&content)?;
        }

        // Environment wins over the file
        if let Ok(port) = env::var("PORT") {
            config.port = port
                .parse::<u16>()
                .map_err(|_| config_error(&format!("Invalid PORT value: {}", port)))?;
        }
        if let Ok(frontend_url) = env::var("FRONTEND_URL") {
            config.frontend_url = frontend_url;
        }
        if let Ok(timezone) = env::var("CALENDAR_TIMEZONE") {
            config.timezone = timezone;
        }

        config.validate()?;
        Ok(config)
    }

    /// Merge the keys present in a `relay.toml` document into this config
    pub fn apply_file_overrides(&mut self, content: &str) -> RelayResult<()> {
        let overrides: FileOverrides = toml::from_str(content)?;

        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(frontend_url) = overrides.frontend_url {
            self.frontend_url = frontend_url;
        }
        if let Some(timezone) = overrides.timezone {
            self.timezone = timezone;
        }
        Ok(())
    }

    /// Check values that would otherwise only fail at the remote API
    pub fn validate(&self) -> RelayResult<()> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| config_error(&format!("Unknown timezone: {}", self.timezone)))?;

        url::Url::parse(&self.frontend_url)
            .map_err(|e| config_error(&format!("Invalid FRONTEND_URL: {}", e)))?;

        Ok(())
    }
}
