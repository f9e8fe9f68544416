use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use meetsync_backend::{app, logging, AppState, Config, SqliteStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    logging::init_tracing(&config.logging.level);

    tracing::info!("Starting MeetSync backend");

    let store = Arc::new(SqliteStore::new(&config.database.url)?);
    tracing::info!("Opened database at {}", config.database.url);

    let state = Arc::new(AppState::new(config.clone(), store));
    let subscribers = state.spawn_subscribers();
    tracing::debug!("Started {} event subscribers", subscribers.len());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
