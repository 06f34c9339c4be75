use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Token payload returned by the Google token endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// The signed-in user's OAuth2 credentials
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Build credentials from a token response, turning `expires_in` into an absolute expiry.
    /// A lifetime too large to represent is treated as no expiry.
    pub fn from_token_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        let expiry = response
            .expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime));

        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expiry,
        }
    }

    /// True if the access token is expired or will be within `margin`.
    /// Credentials without a known expiry are treated as valid.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= now + margin,
            None => false,
        }
    }
}

// Tokens stay out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Request body accepted by `/addEvent`.
/// Values are forwarded as given; Google decides what is legal.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventInput {
    pub summary: Option<Value>,
    pub location: Option<Value>,
    pub description: Option<Value>,
    pub start: Option<Value>,
    pub end: Option<Value>,
}

/// Start or end of an event in the Calendar API shape
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<Value>,
    pub time_zone: String,
}

/// Event resource sent to the Calendar API insert endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventResource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    pub start: EventDateTime,
    pub end: EventDateTime,
}

impl EventInput {
    /// Map the request fields onto an event resource in the given timezone
    pub fn into_resource(self, time_zone: &str) -> EventResource {
        EventResource {
            summary: self.summary,
            location: self.location,
            description: self.description,
            start: EventDateTime {
                date_time: self.start,
                time_zone: time_zone.to_string(),
            },
            end: EventDateTime {
                date_time: self.end,
                time_zone: time_zone.to_string(),
            },
        }
    }
}
