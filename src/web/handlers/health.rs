use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{AppContext, BUILD_VERSION};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub build: String,
    pub environment: String,
    pub extractor: String,
}

pub async fn health_check(State(ctx): State<Arc<AppContext>>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: ctx.settings.app_version.clone(),
        build: BUILD_VERSION.clone(),
        environment: ctx.settings.environment.clone(),
        extractor: ctx.processor.extractor_name().to_string(),
    })
}
