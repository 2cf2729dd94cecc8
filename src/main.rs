use binroute::{create_router, logging, start_session, Config};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let _log_guard = logging::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration (is BACKEND_URL set?): {}", e);
            std::process::exit(1);
        }
    };
    let address = config.server_address.clone();

    let state = match start_session(config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to start navigation session: {}", e);
            std::process::exit(1);
        }
    };

    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", address, e);
            std::process::exit(1);
        }
    };

    info!("starting driver bridge on {}", address);
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("shutting down");
}
