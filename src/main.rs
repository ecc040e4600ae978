//! Streamgate Server entry point.

mod config;

use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use streamgate_http::AppState;
use streamgate_service::ServiceState;

use config::Config;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let service = ServiceState::new(&config.service_config());
    let state = AppState::new(service.clone(), config.cors_origins.clone());

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        max_sessions = config.max_sessions,
        rate_limit = config.rate_limit_requests,
        "Streamgate Server starting",
    );

    let app = streamgate_http::router(state);

    let addr = SocketAddr::new(config.host.parse().expect("invalid host"), config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    // Session sweep: removes sessions idle past the timeout.
    let sweep_state = service.clone();
    let sweep_token = service.shutdown_token();
    let session_sweep = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_state.cleanup_interval());
        ticker.tick().await;
        loop {
            tokio::select! {
                () = sweep_token.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = sweep_state.cleanup_expired_sessions();
                    if removed > 0 {
                        tracing::info!(removed, "Cleaned up expired sessions");
                    }
                }
            }
        }
    });

    // Rate-limit sweep: drops buckets for clients that went quiet.
    let limiter_state = service.clone();
    let limiter_token = service.shutdown_token();
    let rate_limit_sweep = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(limiter_state.rate_limit_sweep_interval());
        ticker.tick().await;
        loop {
            tokio::select! {
                () = limiter_token.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = limiter_state.cleanup_rate_limits();
                    if removed > 0 {
                        tracing::debug!(removed, "Dropped idle rate-limit buckets");
                    }
                }
            }
        }
    });

    tracing::info!(%addr, "Streamgate Server ready");

    // Shutdown must cancel dispatchers and close queues before the graceful
    // drain, or long-lived SSE connections would hold the drain open forever.
    let shutdown_service = service.clone();
    streamgate_http::serve(listener, app, async move {
        shutdown_signal().await;
        shutdown_service.shutdown();
    })
    .await;

    let _ = session_sweep.await;
    let _ = rate_limit_sweep.await;

    tracing::info!("Streamgate Server shut down");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install signal handler");
    tracing::info!("Shutdown signal received");
}
