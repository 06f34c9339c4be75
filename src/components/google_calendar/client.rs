use super::models::EventInput;
use crate::config::{Config, EVENTS_PAGE_SIZE};
use crate::error::{google_calendar_error, RelayResult};
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Calendar all operations act on
const PRIMARY_CALENDAR: &str = "primary";

/// Forwards calendar operations to the Google Calendar API
#[derive(Clone)]
pub struct CalendarGateway {
    client: Client,
    base_url: String,
    timezone: String,
}

impl CalendarGateway {
    /// Create a gateway from the relay configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.calendar_api_base.trim_end_matches('/').to_string(),
            timezone: config.timezone.clone(),
        }
    }

    fn url(&self, path: &str) -> RelayResult<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| google_calendar_error(&format!("Failed to parse URL: {}", e)))
    }

    /// Upcoming events on the primary calendar, starting now, recurring events expanded
    pub async fn list_events(&self, access_token: &str) -> RelayResult<Vec<Value>> {
        let mut url = self.url(&format!("/calendars/{}/events", PRIMARY_CALENDAR))?;
        url.query_pairs_mut()
            .append_pair(
                "timeMin",
                &Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            )
            .append_pair("maxResults", &EVENTS_PAGE_SIZE.to_string())
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime");

        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to fetch events: {}", e)))?;

        let body = Self::handle_response(response, "fetch events").await?;
        Ok(Self::items(body))
    }

    /// Calendars on the signed-in user's calendar list
    pub async fn list_calendars(&self, access_token: &str) -> RelayResult<Vec<Value>> {
        let url = self.url("/users/me/calendarList")?;

        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to fetch calendar list: {}", e)))?;

        let body = Self::handle_response(response, "fetch calendar list").await?;
        Ok(Self::items(body))
    }

    /// Insert an event into the primary calendar and return the created resource
    pub async fn create_event(&self, access_token: &str, input: EventInput) -> RelayResult<Value> {
        let url = self.url(&format!("/calendars/{}/events", PRIMARY_CALENDAR))?;
        let event = input.into_resource(&self.timezone);
        debug!("Creating event: {:?}", event);

        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&event)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to create event: {}", e)))?;

        Self::handle_response(response, "create event").await
    }

    async fn handle_response(response: Response, action: &str) -> RelayResult<Value> {
        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(google_calendar_error(&format!(
                "Failed to {}: HTTP {} - {}",
                action, status, error_body
            )));
        }

        response.json::<Value>().await.map_err(|e| {
            google_calendar_error(&format!("Failed to parse {} response: {}", action, e))
        })
    }

    fn items(mut body: Value) -> Vec<Value> {
        match body.get_mut("items").map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        }
    }
}
