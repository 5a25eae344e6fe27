use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers::{
    all_events, health_check, latest_event, send_message, track_open, AppState,
};

pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/send", post(send_message))
        .route("/tracking/{id}", get(latest_event))
        .route("/tracking/{id}/events", get(all_events))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/health", get(health_check))
        .route("/track/{id}", get(track_open))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
