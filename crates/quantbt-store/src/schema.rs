//! 스키마 부트스트랩.
//!
//! 시작 시 필요한 테이블과 인덱스를 생성합니다 (IF NOT EXISTS 멱등).

use sqlx::PgPool;
use tracing::info;

use crate::error::StoreResult;

/// 모든 테이블과 인덱스를 생성합니다.
pub async fn init(pool: &PgPool) -> StoreResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS backtest_jobs (
            id              BIGSERIAL PRIMARY KEY,
            version         BIGINT NOT NULL DEFAULT 0,
            strategy_name   TEXT NOT NULL,
            symbol          TEXT NOT NULL,
            start_date      DATE NOT NULL,
            end_date        DATE NOT NULL,
            parameters_json TEXT NOT NULL DEFAULT '{}',
            status          TEXT NOT NULL,
            idempotency_key TEXT NOT NULL,
            parent_sweep_id BIGINT,
            attempt_count   INT NOT NULL DEFAULT 0,
            failure_reason  TEXT,
            created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT uk_idempotency_key UNIQUE (idempotency_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS backtest_results (
            id                BIGSERIAL PRIMARY KEY,
            job_id            BIGINT NOT NULL REFERENCES backtest_jobs (id),
            total_return      NUMERIC(12, 4) NOT NULL,
            cagr              NUMERIC(12, 4) NOT NULL,
            volatility        NUMERIC(12, 4) NOT NULL,
            sharpe_ratio      NUMERIC(12, 4) NOT NULL,
            sortino_ratio     NUMERIC(12, 4) NOT NULL,
            max_drawdown      NUMERIC(12, 4) NOT NULL,
            win_rate          NUMERIC(12, 4) NOT NULL,
            execution_time_ms BIGINT NOT NULL,
            trades_json       TEXT NOT NULL DEFAULT '[]',
            created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS parameter_sweeps (
            id                  BIGSERIAL PRIMARY KEY,
            name                TEXT NOT NULL,
            description         TEXT,
            status              TEXT NOT NULL,
            total_jobs          INT NOT NULL,
            completed_jobs      INT NOT NULL DEFAULT 0,
            failed_jobs         INT NOT NULL DEFAULT 0,
            optimization_metric TEXT NOT NULL,
            best_job_id         BIGINT,
            best_metric_value   NUMERIC(12, 4),
            created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            completed_at        TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS market_data (
            id     BIGSERIAL PRIMARY KEY,
            symbol TEXT NOT NULL,
            date   DATE NOT NULL,
            open   NUMERIC(12, 4) NOT NULL,
            high   NUMERIC(12, 4) NOT NULL,
            low    NUMERIC(12, 4) NOT NULL,
            close  NUMERIC(12, 4) NOT NULL,
            volume BIGINT NOT NULL,
            CONSTRAINT uk_symbol_date UNIQUE (symbol, date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_jobs_status ON backtest_jobs (status)",
        "CREATE INDEX IF NOT EXISTS idx_jobs_parent_sweep ON backtest_jobs (parent_sweep_id)",
        "CREATE INDEX IF NOT EXISTS idx_jobs_strategy_name ON backtest_jobs (strategy_name)",
        "CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON backtest_jobs (created_at)",
        "CREATE INDEX IF NOT EXISTS idx_results_job_id ON backtest_results (job_id)",
        "CREATE INDEX IF NOT EXISTS idx_sweeps_status ON parameter_sweeps (status)",
        "CREATE INDEX IF NOT EXISTS idx_market_data_symbol_date ON market_data (symbol, date)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Database schema initialized");
    Ok(())
}
