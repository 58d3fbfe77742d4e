use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use quinta::clock::SystemClock;
use quinta::config::AppConfig;
use quinta::db;
use quinta::handlers;
use quinta::services::sweeper;
use quinta::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env();
    if config.admin_token == "changeme" {
        tracing::warn!("ADMIN_TOKEN is not set, admin routes accept the default token");
    }

    let conn = db::init_db(&config.database_url)?;
    tracing::info!(
        database = %config.database_url,
        hold_minutes = config.hold_duration_minutes,
        "database ready"
    );

    let state = Arc::new(AppState::new(conn, config.clone(), Arc::new(SystemClock)));

    if config.sweep_interval_secs > 0 {
        let every = Duration::from_secs(config.sweep_interval_secs);
        tokio::spawn(sweeper::run_sweeper(Arc::clone(&state), every));
        tracing::info!("hold sweeper running every {}s", config.sweep_interval_secs);
    } else {
        tracing::info!("hold sweeper disabled");
    }

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
