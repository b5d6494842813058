mod config;

use std::sync::Arc;

use tracing::info;

use retro_api::AppStateInner;
use retro_core::SystemClock;
use retro_gateway::Dispatcher;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "retroboard=debug,retro_api=debug,retro_db=debug,retro_gateway=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = retro_db::Database::open(&config.db_path)?;

    let state = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret,
        dispatcher: Dispatcher::new(),
        clock: Arc::new(SystemClock),
        billing: config.billing,
    });

    let app = retro_api::router(state);

    info!("Retroboard listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
