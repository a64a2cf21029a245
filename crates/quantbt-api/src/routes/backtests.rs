//! 백테스트 API 엔드포인트.
//!
//! - `POST /backtests` - 백테스트 잡 제출 (멱등)
//! - `POST /backtests/sweeps` - 파라미터 스윕 제출
//! - `GET /backtests/sweeps/{id}` - 스윕 상태 조회

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use quantbt_core::JobStatus;
use quantbt_orchestrator::{
    StrategyGrid, SubmissionOutcome, SubmitError, SubmitRequest, SweepError, SweepRequest,
    SweepStatus,
};
use quantbt_store::ResultRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::error::{internal_error, not_found, validation_error, ApiResult};
use crate::state::AppState;

// ==================== 검증 함수 ====================

/// 초기 자본 검증 (> 0).
fn validate_initial_capital(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("initial_capital_not_positive")
            .with_message("Initial capital must be positive".into()));
    }
    Ok(())
}

/// 파라미터는 JSON 객체여야 합니다.
fn validate_parameters(value: &Value) -> Result<(), ValidationError> {
    if !value.is_object() {
        return Err(ValidationError::new("parameters_not_object")
            .with_message("Parameters must be a JSON object".into()));
    }
    Ok(())
}

fn validate_date_range(request: &SubmitBacktestRequest) -> Result<(), ValidationError> {
    check_date_range(request.start_date, request.end_date)
}

fn validate_sweep_date_range(request: &ParameterSweepRequestDto) -> Result<(), ValidationError> {
    check_date_range(request.start_date, request.end_date)
}

fn check_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
    if end < start {
        return Err(ValidationError::new("invalid_date_range")
            .with_message("End date must not precede start date".into()));
    }
    Ok(())
}

// ==================== 요청/응답 타입 ====================

/// 백테스트 제출 요청.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = validate_date_range))]
pub struct SubmitBacktestRequest {
    #[validate(length(min = 1, message = "Strategy name is required"))]
    pub strategy_name: String,
    #[validate(length(min = 1, message = "Symbol is required"))]
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(custom(function = validate_parameters))]
    pub parameters: Value,
    #[validate(custom(function = validate_initial_capital))]
    pub initial_capital: Decimal,
}

/// 저장된 결과 요약.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub total_return: Decimal,
    pub cagr: Decimal,
    pub volatility: Decimal,
    pub sharpe_ratio: Decimal,
    pub sortino_ratio: Decimal,
    pub max_drawdown: Decimal,
    pub win_rate: Decimal,
    pub execution_time_ms: i64,
}

impl From<&ResultRecord> for ResultSummary {
    fn from(record: &ResultRecord) -> Self {
        Self {
            total_return: record.total_return,
            cagr: record.cagr,
            volatility: record.volatility,
            sharpe_ratio: record.sharpe_ratio,
            sortino_ratio: record.sortino_ratio,
            max_drawdown: record.max_drawdown,
            win_rate: record.win_rate,
            execution_time_ms: record.execution_time_ms,
        }
    }
}

/// 백테스트 제출 응답.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBacktestResponse {
    pub job_id: i64,
    pub status: JobStatus,
    pub message: String,
    pub is_existing: bool,
    /// 기존 잡이 COMPLETED인 경우 저장된 결과
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultSummary>,
}

impl From<SubmissionOutcome> for SubmitBacktestResponse {
    fn from(outcome: SubmissionOutcome) -> Self {
        Self {
            job_id: outcome.job_id,
            status: outcome.status,
            message: outcome.message,
            is_existing: outcome.is_existing,
            result: outcome.result.as_ref().map(ResultSummary::from),
        }
    }
}

/// 스윕 전략 설정.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StrategyConfigDto {
    #[validate(length(min = 1, message = "Strategy name is required"))]
    pub strategy_name: String,
    #[validate(length(min = 1, message = "At least one parameter combination is required"))]
    pub parameter_combinations: Vec<Value>,
}

/// 파라미터 스윕 제출 요청.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = validate_sweep_date_range))]
pub struct ParameterSweepRequestDto {
    #[validate(length(min = 1, message = "Sweep name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Symbol is required"))]
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(custom(function = validate_initial_capital))]
    pub initial_capital: Decimal,
    #[validate(length(min = 1, message = "Optimization metric is required"))]
    pub optimization_metric: String,
    #[validate(
        length(min = 1, message = "At least one strategy configuration is required"),
        nested
    )]
    pub strategies: Vec<StrategyConfigDto>,
}

/// 스윕 최적 자식 상세.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestJobResultDto {
    pub job_id: i64,
    pub strategy_name: String,
    /// 자식 잡의 파라미터 블롭 (canonical JSON 문자열)
    pub parameters: String,
    #[serde(flatten)]
    pub metrics: ResultSummary,
    pub optimization_metric_value: Decimal,
}

/// 스윕 제출/조회 응답.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSweepResponseDto {
    pub sweep_job_id: i64,
    pub status: JobStatus,
    pub message: String,
    pub total_jobs: i32,
    pub completed_jobs: i32,
    pub failed_jobs: i32,
    pub child_job_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_result: Option<BestJobResultDto>,
}

impl From<SweepStatus> for ParameterSweepResponseDto {
    fn from(status: SweepStatus) -> Self {
        let best_result = status.best.map(|best| BestJobResultDto {
            job_id: best.job_id,
            strategy_name: best.strategy_name,
            parameters: best.parameters_json,
            metrics: ResultSummary::from(&best.result),
            optimization_metric_value: best.optimization_metric_value,
        });

        Self {
            sweep_job_id: status.sweep.id,
            status: status.sweep.status,
            message: "Sweep job status retrieved".to_string(),
            total_jobs: status.sweep.total_jobs,
            completed_jobs: status.sweep.completed_jobs,
            failed_jobs: status.sweep.failed_jobs,
            child_job_ids: status.child_job_ids,
            best_result,
        }
    }
}

// ==================== 핸들러 ====================

/// 백테스트 잡 제출.
///
/// POST /backtests
pub async fn submit_backtest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitBacktestRequest>,
) -> ApiResult<(StatusCode, Json<SubmitBacktestResponse>)> {
    request
        .validate()
        .map_err(|e| validation_error(e.to_string()))?;

    info!(
        "POST /backtests - strategy: {}, symbol: {}",
        request.strategy_name, request.symbol
    );

    let outcome = state
        .submissions
        .submit(SubmitRequest {
            strategy_name: request.strategy_name,
            symbol: request.symbol,
            start_date: request.start_date,
            end_date: request.end_date,
            parameters: request.parameters,
            initial_capital: request.initial_capital,
        })
        .await
        .map_err(|e| {
            error!("Backtest submission failed: {}", e);
            match e {
                SubmitError::Store(_) => internal_error("DB_ERROR"),
                SubmitError::Queue(_) => internal_error("QUEUE_ERROR"),
            }
        })?;

    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// 파라미터 스윕 제출.
///
/// POST /backtests/sweeps
pub async fn submit_sweep(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ParameterSweepRequestDto>,
) -> ApiResult<(StatusCode, Json<ParameterSweepResponseDto>)> {
    request
        .validate()
        .map_err(|e| validation_error(e.to_string()))?;

    info!(
        "POST /backtests/sweeps - name: {}, strategies: {}",
        request.name,
        request.strategies.len()
    );

    let outcome = state
        .sweeps
        .submit_sweep(SweepRequest {
            name: request.name,
            description: request.description,
            symbol: request.symbol,
            start_date: request.start_date,
            end_date: request.end_date,
            initial_capital: request.initial_capital,
            optimization_metric: request.optimization_metric,
            strategies: request
                .strategies
                .into_iter()
                .map(|grid| StrategyGrid {
                    strategy_name: grid.strategy_name,
                    parameter_combinations: grid.parameter_combinations,
                })
                .collect(),
        })
        .await
        .map_err(|e| {
            error!("Sweep submission failed: {}", e);
            match e {
                SweepError::Store(_) => internal_error("DB_ERROR"),
                SweepError::Queue(_) => internal_error("QUEUE_ERROR"),
            }
        })?;

    let response = ParameterSweepResponseDto {
        sweep_job_id: outcome.sweep_id,
        status: outcome.status,
        message: outcome.message,
        total_jobs: outcome.total_jobs,
        completed_jobs: 0,
        failed_jobs: 0,
        child_job_ids: outcome.child_job_ids,
        best_result: None,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// 스윕 상태와 최적 결과 조회.
///
/// GET /backtests/sweeps/{id}
pub async fn get_sweep_status(
    State(state): State<Arc<AppState>>,
    Path(sweep_id): Path<i64>,
) -> ApiResult<Json<ParameterSweepResponseDto>> {
    info!("GET /backtests/sweeps/{}", sweep_id);

    let status = state
        .sweeps
        .sweep_status(sweep_id)
        .await
        .map_err(|e| {
            error!("Sweep status lookup failed: {}", e);
            internal_error("DB_ERROR")
        })?
        .ok_or_else(|| not_found(format!("Sweep job {} not found", sweep_id)))?;

    Ok(Json(status.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn valid_request() -> SubmitBacktestRequest {
        SubmitBacktestRequest {
            strategy_name: "BuyAndHold".to_string(),
            symbol: "AAPL".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            parameters: json!({}),
            initial_capital: dec!(10000),
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn test_empty_strategy_name_rejected() {
        let mut request = valid_request();
        request.strategy_name = String::new();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_non_positive_capital_rejected() {
        let mut request = valid_request();
        request.initial_capital = Decimal::ZERO;
        assert!(request.validate().is_err());

        request.initial_capital = dec!(-100);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_inverted_date_range_rejected() {
        let mut request = valid_request();
        request.start_date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        request.end_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_non_object_parameters_rejected() {
        let mut request = valid_request();
        request.parameters = json!([1, 2, 3]);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_request_deserializes_from_camel_case() {
        let body = json!({
            "strategyName": "ma_crossover",
            "symbol": "AAPL",
            "startDate": "2024-01-01",
            "endDate": "2024-12-31",
            "parameters": {"shortPeriod": 10, "longPeriod": 50},
            "initialCapital": "10000"
        });

        let request: SubmitBacktestRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.strategy_name, "ma_crossover");
        assert_eq!(request.initial_capital, dec!(10000));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_sweep_request_requires_strategies() {
        let dto = ParameterSweepRequestDto {
            name: "grid".to_string(),
            description: None,
            symbol: "AAPL".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            initial_capital: dec!(10000),
            optimization_metric: "sharpeRatio".to_string(),
            strategies: vec![],
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_sweep_nested_validation() {
        let dto = ParameterSweepRequestDto {
            name: "grid".to_string(),
            description: None,
            symbol: "AAPL".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            initial_capital: dec!(10000),
            optimization_metric: "sharpeRatio".to_string(),
            strategies: vec![StrategyConfigDto {
                strategy_name: "ma_crossover".to_string(),
                parameter_combinations: vec![],
            }],
        };
        assert!(dto.validate().is_err());
    }
}
