//! grants-sample: a small API guarded by the xavyo-grants refresh layer.

mod claims;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;
use xavyo_grants::{
    CachedGrantEvaluator, GrantEvaluator, GrantsConfig, GrantsLayer, HttpGrantsClient,
};

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,xavyo_grants=debug")),
        )
        .init();

    let config = match GrantsConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let addr: SocketAddr = match std::env::var("GRANTS_SAMPLE_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
    {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("Invalid GRANTS_SAMPLE_ADDR: {e}");
            std::process::exit(1);
        }
    };

    let client = match HttpGrantsClient::new(&config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("Failed to build grants client: {e}");
            std::process::exit(1);
        }
    };

    info!(
        base_uri = %config.base_uri,
        use_cache = config.use_cache,
        cache_ttl_secs = config.cache_ttl.as_secs(),
        cache_scope = %config.cache_scope,
        "Starting grants-sample"
    );

    let grants_layer = GrantsLayer::from_config(client, config);
    let grants: Arc<dyn GrantEvaluator> = Arc::new(CachedGrantEvaluator::new(Arc::clone(
        grants_layer.gate().cache(),
    )));

    // Layers run bottom-up: claims are decoded before the grants refresh.
    let app = routes::router(routes::AppState { grants })
        .layer(grants_layer)
        .layer(axum::middleware::from_fn(claims::claims_middleware));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    info!("Listening on {addr}");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
