// Export components
pub mod google_calendar;

pub use google_calendar::{CalendarGateway, CredentialStore, OAuthClient};
