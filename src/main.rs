mod config;
mod protocol;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "instantboard=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(config::Config::from_env());
    let (hub, hub_task) = services::hub::spawn_hub(config.hub_queue_capacity);
    let _reaper = services::reaper::spawn_reaper_task(hub.clone(), config.reaper_interval, config.board_idle_ttl);

    let state = state::AppState::new(hub.clone(), config.clone());
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    info!(
        port = config.port,
        idle_ttl_secs = config.board_idle_ttl.as_secs(),
        reaper_interval_secs = config.reaper_interval.as_secs(),
        "instantboard listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    hub.shutdown().await;
    let _ = hub_task.await;
    info!("server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}
