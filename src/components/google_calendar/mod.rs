//! Google Calendar integration: OAuth2 sign-in, the in-memory credential
//! store, and the gateway that forwards calendar requests.

mod actor;
mod client;
mod handle;
pub mod models;
pub mod token;

pub use actor::TokenEvent;
pub use client::CalendarGateway;
pub use handle::CredentialStore;
pub use models::{Credentials, EventInput, TokenResponse};
pub use token::OAuthClient;
