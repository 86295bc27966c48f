use crate::api::{handlers, AppState};
use axum::{
    routing::{delete, get, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::health_check))
        .route("/health/ready", get(handlers::health_check))
        // Live notification stream (SSE)
        .route("/api/notifications/stream", get(handlers::notification_stream))
        // Relay status
        .route("/api/notifications/status", get(handlers::relay_status))
        // Stored notifications
        .route("/api/notifications", get(handlers::list_notifications))
        .route("/api/notifications", delete(handlers::delete_all_notifications))
        .route("/api/notifications/read-all", put(handlers::mark_all_read))
        .route("/api/notifications/:id", get(handlers::get_notification))
        .route("/api/notifications/:id", delete(handlers::delete_notification))
        .route("/api/notifications/:id/read", put(handlers::mark_read));

    if state.prometheus_enabled {
        router = router.route("/metrics", get(handlers::metrics));
    }

    router
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CorsLayer::permissive())
}
