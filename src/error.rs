use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the relay
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Environment error: {0}")]
    #[diagnostic(code(calendar_relay::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(calendar_relay::config))]
    Config(String),

    #[error("OAuth2 token exchange failed: {0}")]
    #[diagnostic(code(calendar_relay::auth_exchange))]
    AuthExchange(String),

    #[error("Google Calendar API error: {0}")]
    #[diagnostic(code(calendar_relay::google_calendar))]
    GoogleCalendar(String),

    #[error("Not authenticated: complete the /auth flow first")]
    #[diagnostic(code(calendar_relay::unauthenticated))]
    Unauthenticated,

    #[error("Access token expired and no refresh token is available")]
    #[diagnostic(code(calendar_relay::token_expired))]
    TokenExpired,

    #[error("Credential store error: {0}")]
    #[diagnostic(code(calendar_relay::credential_store))]
    CredentialStore(String),

    #[error(transparent)]
    #[diagnostic(code(calendar_relay::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(calendar_relay::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(calendar_relay::other))]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type RelayResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create token exchange errors
pub fn auth_exchange_error(message: &str) -> Error {
    Error::AuthExchange(message.to_string())
}

/// Helper to create Google Calendar errors
pub fn google_calendar_error(message: &str) -> Error {
    Error::GoogleCalendar(message.to_string())
}

/// Helper to create credential store errors
pub fn credential_store_error(message: &str) -> Error {
    Error::CredentialStore(message.to_string())
}
