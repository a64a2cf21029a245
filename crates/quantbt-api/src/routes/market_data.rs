//! 시장 데이터 수집 엔드포인트.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{error, info};

use crate::error::{internal_error, validation_error, ApiResult};
use crate::state::AppState;

/// CSV 수집 응답.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub symbol: String,
    pub records_saved: usize,
}

/// CSV 시장 데이터 수집.
///
/// POST /market-data/{symbol}/csv
///
/// 본문은 `Date,Open,High,Low,Close,Volume` 형식의 CSV 텍스트입니다.
pub async fn ingest_market_data(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    body: String,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    if symbol.trim().is_empty() {
        return Err(validation_error("Symbol is required"));
    }
    if body.trim().is_empty() {
        return Err(validation_error("CSV body is empty"));
    }

    info!("POST /market-data/{}/csv ({} bytes)", symbol, body.len());

    let records_saved = quantbt_data::ingest_csv(&state.pool, &symbol, &body)
        .await
        .map_err(|e| {
            error!("CSV ingestion failed for {}: {}", symbol, e);
            internal_error("DB_ERROR")
        })?;

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            symbol,
            records_saved,
        }),
    ))
}
