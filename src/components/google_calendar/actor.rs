use super::models::Credentials;
use crate::error::{credential_store_error, RelayResult};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Token updates delivered to the credential store
#[derive(Debug, Clone)]
pub enum TokenEvent {
    /// A code exchange produced a fresh credential set
    Installed(Credentials),
    /// A refresh produced a new access token, and possibly a new refresh token.
    /// Only applies while the store still holds `issued_for`.
    Refreshed {
        credentials: Credentials,
        issued_for: String,
    },
}

/// Commands that can be sent to the credential store actor
pub enum CredentialCommand {
    Apply(TokenEvent),
    Get(oneshot::Sender<Option<Credentials>>),
    Clear,
    Shutdown,
}

/// Owns the single credential slot
pub struct CredentialStoreActor {
    credentials: Option<Credentials>,
    command_rx: mpsc::Receiver<CredentialCommand>,
}

/// Handle for communicating with the credential store actor
#[derive(Clone)]
pub struct CredentialStoreActorHandle {
    command_tx: mpsc::Sender<CredentialCommand>,
}

impl CredentialStoreActorHandle {
    /// Deliver a token event to the store
    pub async fn apply(&self, event: TokenEvent) -> RelayResult<()> {
        self.command_tx
            .send(CredentialCommand::Apply(event))
            .await
            .map_err(|e| credential_store_error(&format!("Actor mailbox error: {}", e)))
    }

    /// Read the current credentials
    pub async fn get(&self) -> RelayResult<Option<Credentials>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(CredentialCommand::Get(response_tx))
            .await
            .map_err(|e| credential_store_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .await
            .map_err(|_| credential_store_error("Response channel closed"))
    }

    /// Forget the current credentials
    pub async fn clear(&self) -> RelayResult<()> {
        self.command_tx
            .send(CredentialCommand::Clear)
            .await
            .map_err(|e| credential_store_error(&format!("Actor mailbox error: {}", e)))
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> RelayResult<()> {
        let _ = self.command_tx.send(CredentialCommand::Shutdown).await;
        Ok(())
    }
}

impl CredentialStoreActor {
    /// Create a new actor and return its handle
    pub fn new() -> (Self, CredentialStoreActorHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);

        let actor = Self {
            credentials: None,
            command_rx,
        };

        (actor, CredentialStoreActorHandle { command_tx })
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Credential store actor started");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                CredentialCommand::Apply(event) => self.apply(event),
                CredentialCommand::Get(response_tx) => {
                    let _ = response_tx.send(self.credentials.clone());
                }
                CredentialCommand::Clear => {
                    self.credentials = None;
                    info!("Credentials cleared");
                }
                CredentialCommand::Shutdown => {
                    info!("Credential store actor shutting down");
                    break;
                }
            }
        }

        info!("Credential store actor shut down");
    }

    fn apply(&mut self, event: TokenEvent) {
        match event {
            TokenEvent::Installed(credentials) => {
                debug!("Installing credentials: {:?}", credentials);
                self.credentials = Some(credentials);
            }
            TokenEvent::Refreshed {
                credentials: mut refreshed,
                issued_for,
            } => {
                let current_refresh_token = self
                    .credentials
                    .as_ref()
                    .and_then(|current| current.refresh_token.as_deref());

                // A sign-in or clear happened while the refresh was in flight
                if current_refresh_token != Some(issued_for.as_str()) {
                    info!("Dropping refreshed token for a credential set that was replaced");
                    return;
                }

                debug!("Applying refreshed credentials: {:?}", refreshed);
                // Google only sometimes rotates the refresh token
                if refreshed.refresh_token.is_none() {
                    refreshed.refresh_token = Some(issued_for);
                }
                self.credentials = Some(refreshed);
            }
        }
    }
}
