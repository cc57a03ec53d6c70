use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Upper bound for any request, extraction included
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Room for multipart boundaries and headers around the image bytes
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the main application router with all routes and middleware
#[tracing::instrument(skip(state))]
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = state.config.vision.max_image_bytes + MULTIPART_OVERHEAD_BYTES;

    let medicine_routes = Router::new()
        .route(
            "/api/medicines",
            get(handlers::medicines::list_medicines).post(handlers::medicines::create_medicine),
        )
        .route(
            "/api/medicines/expiring",
            get(handlers::medicines::list_expiring),
        )
        .route(
            "/api/medicines/extract",
            post(handlers::medicines::extract_from_image)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/medicines/:id",
            get(handlers::medicines::get_medicine),
        )
        .route(
            "/api/medicines/:id",
            delete(handlers::medicines::delete_medicine),
        );

    let notification_routes = Router::new()
        .route(
            "/api/notifications/settings",
            get(handlers::notifications::get_settings)
                .post(handlers::notifications::update_settings)
                .put(handlers::notifications::update_settings),
        )
        .route(
            "/api/notifications/subscribe",
            post(handlers::notifications::subscribe),
        )
        .route(
            "/api/notifications/history",
            get(handlers::notifications::history),
        )
        .route(
            "/api/notifications/test",
            post(handlers::notifications::send_test_notification),
        )
        .route(
            "/api/notifications/vapid-public-key",
            get(handlers::notifications::vapid_public_key),
        );

    // Health and metrics (no prefix for probes and Prometheus scraping)
    let ops_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics_handler));

    // Combine all routes
    Router::new()
        .merge(medicine_routes)
        .merge(notification_routes)
        .merge(ops_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(cors),
        )
        .with_state(state)
}
