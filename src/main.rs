//! FairServer
//!
//! Long-running REST gateway for a FairCoin daemon's JSON-RPC interface.

use fairserver::api::{create_router, ApiState};
use fairserver::config::Config;
use std::net::SocketAddr;
use std::sync::Arc;

fn main() {
    // A missing .env file is fine; real environment variables take precedence
    let dotenv = dotenvy::dotenv();

    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match dotenv {
        Ok(path) => log::info!("Loaded settings from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("Ignoring unreadable .env file: {}", e),
    }

    // Refuse to start (and never bind) without the daemon settings
    let config = match Config::load() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let outcome: Result<(), Box<dyn std::error::Error>> = tokio::runtime::Runtime::new()
        .map_err(Into::into)
        .and_then(|rt| rt.block_on(run_server(config)));

    if let Err(e) = outcome {
        log::error!("Failed to run FairServer: {}", e);
        std::process::exit(1);
    }
}

async fn run_server(config: Arc<Config>) -> Result<(), Box<dyn std::error::Error>> {
    let state = ApiState::new(config.clone())?;
    log::info!("Forwarding RPC calls to {}", state.rpc.endpoint());

    state.limiter.spawn_sweeper();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    log::info!("FairServer running at {}", config.public_url());

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    log::info!("FairServer stopped");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("Shutting down FairServer...");
}
