use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use common::database;
use amparo_core::notify::{NotifyConfig, spawn_dispatcher};
use amparo_core::routes;
use amparo_core::storage::{SegmentStore, StorageConfig};
use amparo_core::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting coordination core");

    // Initialize database connection pool
    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let store = SegmentStore::new(&StorageConfig::from_env()).await;
    let outbox = spawn_dispatcher(NotifyConfig::from_env());

    let app_state = AppState::new(pool, store, outbox);

    info!("Coordination core initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let bind_addr =
        std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Coordination core listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
