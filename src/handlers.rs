use axum::{
    extract::{rejection::QueryRejection, FromRequest, Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use crate::components::google_calendar::EventInput;
use crate::error::{auth_exchange_error, Error, RelayResult};
use crate::startup::AppState;

pub const HELLO_MESSAGE: &str = "Hello World!!";
pub const AUTH_FAILED: &str = "Authentication failed";
pub const NO_UPCOMING_EVENTS: &str = "No upcoming events found.";
pub const EVENTS_FAILED: &str = "Failed to fetch events";
pub const CALENDAR_LIST_FAILED: &str = "Failed to fetch calendar list";
pub const CREATE_EVENT_FAILED: &str = "Failed to create event";

/// Query parameters Google appends to the redirect URI
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// `/addEvent` body, accepted as JSON or as an urlencoded form.
/// Any other or missing content type is forwarded as an empty event,
/// and undecodable bodies answer like any other create failure.
pub struct EventBody(pub EventInput);

impl<S> FromRequest<S> for EventBody
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase())
            .unwrap_or_default();

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(input) = Form::<EventInput>::from_request(req, state)
                .await
                .map_err(|rejection| body_failure(rejection.body_text()))?;
            Ok(Self(input))
        } else if content_type.starts_with("application/json") || content_type.contains("+json") {
            let Json(input) = Json::<EventInput>::from_request(req, state)
                .await
                .map_err(|rejection| body_failure(rejection.body_text()))?;
            Ok(Self(input))
        } else {
            Ok(Self(EventInput::default()))
        }
    }
}

fn body_failure(reason: String) -> Response {
    failure(
        CREATE_EVENT_FAILED,
        Error::Serialization(format!("Unreadable event body: {}", reason)),
    )
}

/// Plain 302, which is what browsers and OAuth providers expect here
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Log the error and answer with a fixed message
fn failure(message: &'static str, err: Error) -> Response {
    error!("{}: {}", message, err);
    (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
}

/// Handler for the liveness route
pub async fn index_handler() -> &'static str {
    HELLO_MESSAGE
}

/// Send the browser to Google's consent page
pub async fn auth_handler(State(state): State<AppState>) -> Response {
    let url = state.oauth.authorization_url();
    info!("Redirecting to Google consent page");
    found(url.as_str())
}

/// Finish the OAuth2 flow and return to the front-end
pub async fn oauth_callback_handler(
    State(state): State<AppState>,
    params: Result<Query<CallbackParams>, QueryRejection>,
) -> Response {
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            return failure(AUTH_FAILED, auth_exchange_error(&rejection.body_text()));
        }
    };

    match authenticate(&state, params).await {
        Ok(()) => {
            info!("User authenticated, redirecting to {}", state.frontend_url);
            found(&state.frontend_url)
        }
        Err(e) => failure(AUTH_FAILED, e),
    }
}

async fn authenticate(state: &AppState, params: CallbackParams) -> RelayResult<()> {
    let code = match params.code.as_deref() {
        Some(code) if !code.is_empty() => code,
        _ => {
            let reason = params
                .error
                .unwrap_or_else(|| "missing authorization code".to_string());
            return Err(auth_exchange_error(&reason));
        }
    };

    let credentials = state.oauth.exchange_code(code).await?;
    state.credentials.install(credentials).await
}

/// Upcoming events on the primary calendar
pub async fn events_handler(State(state): State<AppState>) -> Response {
    match fetch_events(&state).await {
        Ok(events) if events.is_empty() => NO_UPCOMING_EVENTS.into_response(),
        Ok(events) => Json(events).into_response(),
        Err(e) => failure(EVENTS_FAILED, e),
    }
}

/// The user's calendar list
pub async fn calendar_list_handler(State(state): State<AppState>) -> Response {
    match fetch_calendars(&state).await {
        Ok(calendars) => Json(calendars).into_response(),
        Err(e) => failure(CALENDAR_LIST_FAILED, e),
    }
}

/// Create an event on the primary calendar
pub async fn add_event_handler(
    State(state): State<AppState>,
    EventBody(input): EventBody,
) -> Response {
    match insert_event(&state, input).await {
        Ok(created) => Json(created).into_response(),
        Err(e) => failure(CREATE_EVENT_FAILED, e),
    }
}

async fn fetch_events(state: &AppState) -> RelayResult<Vec<Value>> {
    let token = state.credentials.authorize(&state.oauth).await?;
    state.gateway.list_events(&token).await
}

async fn fetch_calendars(state: &AppState) -> RelayResult<Vec<Value>> {
    let token = state.credentials.authorize(&state.oauth).await?;
    state.gateway.list_calendars(&token).await
}

async fn insert_event(state: &AppState, input: EventInput) -> RelayResult<Value> {
    let token = state.credentials.authorize(&state.oauth).await?;
    state.gateway.create_event(&token, input).await
}
