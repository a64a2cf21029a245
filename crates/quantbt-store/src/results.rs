//! 백테스트 결과 Repository.
//!
//! 결과 행은 추가 전용입니다. 재시도가 성공하면 새 행이 추가되며,
//! 잡의 대표 결과는 가장 큰 id의 행입니다.

use sqlx::{PgConnection, PgPool};
use tracing::debug;

use crate::error::StoreResult;
use crate::records::{NewResult, ResultRecord};

const RESULT_COLUMNS: &str = "id, job_id, total_return, cagr, volatility, sharpe_ratio, \
     sortino_ratio, max_drawdown, win_rate, execution_time_ms, trades_json, created_at";

/// 결과 Repository.
pub struct ResultRepository;

impl ResultRepository {
    /// 결과 행을 추가합니다. 호출자의 트랜잭션에 참여합니다.
    pub async fn insert(
        conn: &mut PgConnection,
        result: &NewResult,
    ) -> StoreResult<ResultRecord> {
        let record = sqlx::query_as::<_, ResultRecord>(&format!(
            r#"
            INSERT INTO backtest_results
                (job_id, total_return, cagr, volatility, sharpe_ratio,
                 sortino_ratio, max_drawdown, win_rate, execution_time_ms, trades_json)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {RESULT_COLUMNS}
            "#
        ))
        .bind(result.job_id)
        .bind(result.total_return)
        .bind(result.cagr)
        .bind(result.volatility)
        .bind(result.sharpe_ratio)
        .bind(result.sortino_ratio)
        .bind(result.max_drawdown)
        .bind(result.win_rate)
        .bind(result.execution_time_ms)
        .bind(&result.trades_json)
        .fetch_one(conn)
        .await?;

        debug!("Saved result {} for job {}", record.id, record.job_id);
        Ok(record)
    }

    /// 잡의 대표(최신) 결과를 조회합니다.
    pub async fn find_latest_by_job_id(
        pool: &PgPool,
        job_id: i64,
    ) -> StoreResult<Option<ResultRecord>> {
        let record = sqlx::query_as::<_, ResultRecord>(&format!(
            "SELECT {RESULT_COLUMNS} FROM backtest_results \
             WHERE job_id = $1 ORDER BY id DESC LIMIT 1"
        ))
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }

    /// 여러 잡의 결과를 단일 라운드트립으로 조회합니다.
    ///
    /// 스윕 최적 자식 선택에서 N+1 쿼리를 피하기 위한 배치 조회입니다.
    /// id 오름차순으로 반환되므로 잡별 최신 행은 마지막에 나타납니다.
    pub async fn find_by_job_ids(
        pool: &PgPool,
        job_ids: &[i64],
    ) -> StoreResult<Vec<ResultRecord>> {
        if job_ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = sqlx::query_as::<_, ResultRecord>(&format!(
            "SELECT {RESULT_COLUMNS} FROM backtest_results \
             WHERE job_id = ANY($1) ORDER BY id ASC"
        ))
        .bind(job_ids)
        .fetch_all(pool)
        .await?;

        Ok(records)
    }

    /// 잡의 결과 행 수.
    pub async fn count_by_job_id(pool: &PgPool, job_id: i64) -> StoreResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM backtest_results WHERE job_id = $1")
                .bind(job_id)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }
}
