//! Pathlight auth server.
//!
//! Wires the identity & token subsystem to its HTTP surface.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod error;
mod handlers;
mod middleware;
mod routes;
mod settings;
mod state;

use api::auth::SWEEP_INTERVAL_SECS;
use settings::Settings;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "server=debug,api=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // A missing signing secret fails here, before anything listens.
    let settings = Settings::new()?;

    let pool = api::db::connect(&settings.database.url()).await?;
    api::db::init_schema(&pool).await?;

    let state = AppState::new(&settings, pool)?;
    let sweeper = state
        .oauth_states
        .clone()
        .start_sweeper(Duration::from_secs(SWEEP_INTERVAL_SECS));

    let app = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
    tracing::info!("listening on {addr}");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
