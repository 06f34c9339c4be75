use crate::components::{CalendarGateway, CredentialStore, OAuthClient};
use crate::config::Config;
use crate::error::{Error, RelayResult};
use crate::handlers::{
    add_event_handler, auth_handler, calendar_list_handler, events_handler, index_handler,
    oauth_callback_handler,
};
use crate::shutdown;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Per-server context handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// The signed-in user's credentials
    pub credentials: CredentialStore,
    /// OAuth2 client for the identity provider
    pub oauth: OAuthClient,
    /// Forwards calendar requests
    pub gateway: CalendarGateway,
    /// Where to send the browser after sign-in
    pub frontend_url: String,
}

impl AppState {
    /// Build the state from config with an empty credential store.
    /// Must be called inside a tokio runtime.
    pub fn from_config(config: &Config) -> RelayResult<Self> {
        Ok(Self {
            credentials: CredentialStore::new(),
            oauth: OAuthClient::from_config(config)?,
            gateway: CalendarGateway::from_config(config),
            frontend_url: config.frontend_url.clone(),
        })
    }
}

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the relay config
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Build the router with all routes and layers
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/auth", get(auth_handler))
        .route("/oauth2callback", get(oauth_callback_handler))
        .route("/events", get(events_handler))
        .route("/calendarList", get(calendar_list_handler))
        .route("/addEvent", post(add_event_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP server until a shutdown signal arrives
pub async fn start_server(config: Config) -> miette::Result<()> {
    let state = AppState::from_config(&config)?;
    let credentials = state.credentials.clone();
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(Error::from)?;
    info!("Server running at http://localhost:{}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::wait_for_signal())
        .await
        .map_err(Error::from)?;

    info!("Server stopped accepting connections");
    shutdown::release_credentials(&credentials).await;

    Ok(())
}
