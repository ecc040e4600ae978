//! Streamgate HTTP — SSE/REST transport adapter for the Streamgate server.
//!
//! Provides the HTTP interface including:
//! - SSE stream endpoint (one persistent server-push channel per client)
//! - Control-message submission with rate-limit admission
//! - Admin/introspection endpoints (sessions, rate limits)
//! - Health and Prometheus metrics endpoints
//! - Request-ID middleware, CORS, OpenAPI/Swagger UI

pub mod encode;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use error::ErrorBody;
use routes::system::HealthResponse;

pub use state::AppState;

// ---------------------------------------------------------------------------
// OpenAPI
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Streamgate API",
        description = "Session and admission layer for server-push streaming.\n\nClients open one persistent SSE channel via `/events` and submit control messages against their session id. Admission is guarded by an adaptive per-client token-bucket rate limiter.",
        version = "0.2.4",
        license(name = "Apache-2.0"),
    ),
    paths(
        routes::system::health,
        routes::messages::submit,
        routes::admin::list_sessions,
        routes::admin::session_detail,
        routes::admin::delete_session,
        routes::admin::registry_stats,
        routes::admin::rate_limit_stats,
        routes::admin::reset_rate_limit,
    ),
    components(
        schemas(
            streamgate_service::types::SessionInfo,
            streamgate_service::types::SessionDetail,
            streamgate_service::types::RegistryStats,
            streamgate_service::types::ClientRateStats,
            streamgate_service::events::OutboundEvent,
            ErrorBody,
            HealthResponse,
        )
    ),
    tags(
        (name = "Messages", description = "Control-message submission onto session queues"),
        (name = "Admin", description = "Session and rate-limit introspection and management"),
        (name = "System", description = "System and health endpoints"),
    )
)]
struct ApiDoc;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Builds the HTTP API router.
///
/// Call this from the binary crate to get a fully-wired axum `Router`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        // Streaming
        .route("/events", get(routes::stream::events))
        // Control messages
        .route("/sessions/{id}/messages", post(routes::messages::submit))
        // Admin
        .route("/admin/sessions", get(routes::admin::list_sessions))
        .route("/admin/sessions/stats", get(routes::admin::registry_stats))
        .route(
            "/admin/sessions/{id}",
            get(routes::admin::session_detail).delete(routes::admin::delete_session),
        )
        .route("/admin/rate-limits", get(routes::admin::rate_limit_stats))
        .route(
            "/admin/rate-limits/{client}/reset",
            post(routes::admin::reset_rate_limit),
        )
        // System
        .route("/health", get(routes::system::health))
        .route("/metrics", get(routes::system::metrics_endpoint))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            middleware::request_id::request_id_middleware,
        ))
        .layer(cors_layer(&state))
        .with_state(state);

    api.merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
}

/// Serve the HTTP router on the given listener with graceful shutdown.
///
/// Wraps `axum::serve` with `ConnectInfo<SocketAddr>` so rate limiting and
/// logging can extract client addresses.
pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .expect("server error");
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins = state.cors_origins();

    // No origins configured → no CORS headers (deny cross-origin by default).
    if origins.is_empty() {
        return CorsLayer::new();
    }

    let x_request_id = axum::http::header::HeaderName::from_static("x-request-id");
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            x_request_id.clone(),
        ])
        .expose_headers([x_request_id]);

    if origins.len() == 1 && origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard origin — all cross-origin requests allowed");
        base.allow_origin(tower_http::cors::Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .map(|o| o.parse().expect("invalid CORS origin"))
            .collect();
        base.allow_origin(parsed)
    }
}
