//! 저장소 레코드 타입.
//!
//! DB 행(`*Row`)과 도메인 레코드(`*Record`)를 분리합니다. 상태 컬럼은
//! TEXT로 저장되며 도메인 레코드에서 [`JobStatus`]로 해석됩니다.

use chrono::{DateTime, NaiveDate, Utc};
use quantbt_core::JobStatus;
use rust_decimal::Decimal;

use crate::error::StoreError;

// ==================== 잡 ====================

/// 잡 DB 행.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct JobRow {
    pub id: i64,
    pub version: i64,
    pub strategy_name: String,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub parameters_json: String,
    pub status: String,
    pub idempotency_key: String,
    pub parent_sweep_id: Option<i64>,
    pub attempt_count: i32,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 백테스트 잡 레코드.
#[derive(Debug, Clone)]
pub struct JobRecord {
    /// 저장소가 부여한 단조 증가 id
    pub id: i64,
    /// 낙관적 동시성 토큰. 모든 변경마다 증가합니다.
    pub version: i64,
    pub strategy_name: String,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// 불투명한 전략 파라미터 블롭 (canonical JSON)
    pub parameters_json: String,
    pub status: JobStatus,
    pub idempotency_key: String,
    /// 부모 스윕 id (스윕 자식인 경우)
    pub parent_sweep_id: Option<i64>,
    /// 실패한 시도 횟수. 단조 증가합니다.
    pub attempt_count: i32,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;

        Ok(JobRecord {
            id: row.id,
            version: row.version,
            strategy_name: row.strategy_name,
            symbol: row.symbol,
            start_date: row.start_date,
            end_date: row.end_date,
            parameters_json: row.parameters_json,
            status,
            idempotency_key: row.idempotency_key,
            parent_sweep_id: row.parent_sweep_id,
            attempt_count: row.attempt_count,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 새 잡 입력.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub strategy_name: String,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub parameters_json: String,
    pub status: JobStatus,
    pub idempotency_key: String,
    pub parent_sweep_id: Option<i64>,
}

// ==================== 결과 ====================

/// 백테스트 결과 레코드.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResultRecord {
    pub id: i64,
    pub job_id: i64,
    pub total_return: Decimal,
    pub cagr: Decimal,
    pub volatility: Decimal,
    pub sharpe_ratio: Decimal,
    pub sortino_ratio: Decimal,
    pub max_drawdown: Decimal,
    pub win_rate: Decimal,
    pub execution_time_ms: i64,
    /// 거래 로그 JSON 블롭
    pub trades_json: String,
    pub created_at: DateTime<Utc>,
}

/// 새 결과 입력.
#[derive(Debug, Clone)]
pub struct NewResult {
    pub job_id: i64,
    pub total_return: Decimal,
    pub cagr: Decimal,
    pub volatility: Decimal,
    pub sharpe_ratio: Decimal,
    pub sortino_ratio: Decimal,
    pub max_drawdown: Decimal,
    pub win_rate: Decimal,
    pub execution_time_ms: i64,
    pub trades_json: String,
}

// ==================== 스윕 ====================

/// 스윕 DB 행.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct SweepRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub total_jobs: i32,
    pub completed_jobs: i32,
    pub failed_jobs: i32,
    pub optimization_metric: String,
    pub best_job_id: Option<i64>,
    pub best_metric_value: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// 파라미터 스윕 레코드.
#[derive(Debug, Clone)]
pub struct SweepRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: JobStatus,
    pub total_jobs: i32,
    pub completed_jobs: i32,
    pub failed_jobs: i32,
    /// 최적화 지표 이름 (예: "sharpeRatio")
    pub optimization_metric: String,
    pub best_job_id: Option<i64>,
    pub best_metric_value: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<SweepRow> for SweepRecord {
    type Error = StoreError;

    fn try_from(row: SweepRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;

        Ok(SweepRecord {
            id: row.id,
            name: row.name,
            description: row.description,
            status,
            total_jobs: row.total_jobs,
            completed_jobs: row.completed_jobs,
            failed_jobs: row.failed_jobs,
            optimization_metric: row.optimization_metric,
            best_job_id: row.best_job_id,
            best_metric_value: row.best_metric_value,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

/// 새 스윕 입력.
#[derive(Debug, Clone)]
pub struct NewSweep {
    pub name: String,
    pub description: Option<String>,
    pub status: JobStatus,
    pub total_jobs: i32,
    pub optimization_metric: String,
}
