//! Trailsync Server binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trailsync_server::config::Config;
use trailsync_server::db::PgRepository;
use trailsync_server::repo::MemoryRepository;
use trailsync_server::{app, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trailsync_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Trailsync Server on {}", config.addr());

    let state = match &config.database_url {
        Some(url) => {
            let repo = PgRepository::connect(url, config.database_max_connections).await?;

            tracing::info!("Running database migrations...");
            repo.migrate().await?;

            AppState::new(repo)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, keeping walks in memory");
            AppState::new(MemoryRepository::new())
        }
    };

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
