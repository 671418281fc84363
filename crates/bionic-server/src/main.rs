//! bionic-server - Bionic Memory backend server
//!
//! REST API over the dual-tier memory engine.

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod routes;
mod state;

use bionic_sdk::SDK;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::Config::load()?;

    let filter = EnvFilter::from_default_env()
        .add_directive("bionic_server=info".parse()?)
        .add_directive("bionic_sdk=info".parse()?);
    if config.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    info!("bionic-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Config loaded from {:?}", config.config_path);

    let mut sdk = SDK::new(config.sdk.clone())?;
    sdk.initialize().await?;

    let app = routes::create_router(state::AppState::new(&sdk));
    let listener = TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "Server ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    sdk.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
    }
}
