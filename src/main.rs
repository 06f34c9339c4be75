use calendar_relay::startup;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting calendar relay");

    // Load configuration
    let config = startup::load_config()?;

    // Serve until SIGINT/SIGTERM
    startup::start_server(config).await
}
