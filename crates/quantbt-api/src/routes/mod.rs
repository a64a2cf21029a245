//! API 라우터 구성.

mod backtests;
mod health;
mod market_data;

pub use backtests::{
    BestJobResultDto, ParameterSweepRequestDto, ParameterSweepResponseDto, ResultSummary,
    StrategyConfigDto, SubmitBacktestRequest, SubmitBacktestResponse,
};
pub use market_data::IngestResponse;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::state::AppState;

/// 전체 API 라우터를 구성합니다.
pub fn create_api_router(state: Arc<AppState>, prometheus: PrometheusHandle) -> Router {
    Router::new()
        .route("/backtests", post(backtests::submit_backtest))
        .route("/backtests/sweeps", post(backtests::submit_sweep))
        .route("/backtests/sweeps/{id}", get(backtests::get_sweep_status))
        .route("/market-data/{symbol}/csv", post(market_data::ingest_market_data))
        .route("/health", get(health::health))
        .route("/metrics", get(move || std::future::ready(prometheus.render())))
        .with_state(state)
}
