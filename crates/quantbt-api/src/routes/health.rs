//! 헬스 체크 엔드포인트.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// 헬스 체크 응답.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub queue: bool,
    pub uptime_secs: i64,
    pub version: String,
}

/// 헬스 체크.
///
/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = state.is_db_healthy().await;
    let queue = state.is_queue_healthy().await;

    let status = if database && queue { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        database,
        queue,
        uptime_secs: state.uptime_secs(),
        version: state.version.clone(),
    })
}
