use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use crate::AppContext;

pub mod events;
pub mod health;

/// Routes are served both at the root and under `/api/v1`.
pub fn router(ctx: Arc<AppContext>) -> Router {
    let api = Router::new()
        .route("/events", post(events::process_events))
        .route("/health", get(health::health_check));

    Router::new()
        .merge(api.clone())
        .nest("/api/v1", api)
        .with_state(ctx)
}
