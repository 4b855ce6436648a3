//! Floro Host - serves plugin state over packetized WebSocket messages.

use floro_host::config::Config;
use floro_host::store::HostStore;
use floro_host::{create_app, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "floro_host=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Floro Host on {}:{}", config.host, config.port);

    let store = match &config.seed_file {
        Some(path) => HostStore::load_seed_file(path)?,
        None => HostStore::new(),
    };

    let addr = format!("{}:{}", config.host, config.port);
    let app = create_app(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
