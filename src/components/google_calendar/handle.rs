use super::actor::{CredentialStoreActor, CredentialStoreActorHandle, TokenEvent};
use super::models::Credentials;
use super::token::OAuthClient;
use crate::error::{Error, RelayResult};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Refresh this long before the access token actually expires
const REFRESH_MARGIN_SECS: i64 = 60;

/// In-memory store for the signed-in user's credentials
#[derive(Clone)]
pub struct CredentialStore {
    actor_handle: CredentialStoreActorHandle,
    _actor_task: Arc<JoinHandle<()>>,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    /// Create a new CredentialStore and spawn its actor
    pub fn new() -> Self {
        let (mut actor, handle) = CredentialStoreActor::new();

        let actor_task = tokio::spawn(async move {
            actor.run().await;
        });

        Self {
            actor_handle: handle,
            _actor_task: Arc::new(actor_task),
        }
    }

    /// Replace the stored credentials
    pub async fn install(&self, credentials: Credentials) -> RelayResult<()> {
        self.actor_handle
            .apply(TokenEvent::Installed(credentials))
            .await
    }

    /// Deliver a token event
    pub async fn apply(&self, event: TokenEvent) -> RelayResult<()> {
        self.actor_handle.apply(event).await
    }

    /// Current credentials, if the user has signed in
    pub async fn current(&self) -> RelayResult<Option<Credentials>> {
        self.actor_handle.get().await
    }

    /// Forget the stored credentials
    pub async fn clear(&self) -> RelayResult<()> {
        self.actor_handle.clear().await
    }

    /// Return an access token that is valid for at least the refresh margin,
    /// refreshing it first when it is about to expire.
    pub async fn authorize(&self, oauth: &OAuthClient) -> RelayResult<String> {
        let credentials = self.current().await?.ok_or(Error::Unauthenticated)?;

        if !credentials.expires_within(Utc::now(), Duration::seconds(REFRESH_MARGIN_SECS)) {
            return Ok(credentials.access_token);
        }

        let refresh_token = credentials.refresh_token.ok_or(Error::TokenExpired)?;

        info!("Access token expiring, refreshing");
        let refreshed = oauth.refresh(&refresh_token).await?;
        let access_token = refreshed.access_token.clone();
        // Ignored by the store if a new sign-in replaced these credentials meanwhile
        self.apply(TokenEvent::Refreshed {
            credentials: refreshed,
            issued_for: refresh_token,
        })
        .await?;

        Ok(access_token)
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> RelayResult<()> {
        self.actor_handle.shutdown().await
    }
}
