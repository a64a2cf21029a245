//! 백테스트 잡 Repository.
//!
//! 잡 행의 생성, 조회, 잠금, 저장을 담당합니다. 트랜잭션에 참여하는
//! 연산(`lock_for_update`, `save`)은 `&mut PgConnection`을 받으며,
//! 호출자가 트랜잭션 경계를 소유합니다.

use quantbt_core::JobStatus;
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::records::{JobRecord, JobRow, NewJob};

const JOB_COLUMNS: &str = "id, version, strategy_name, symbol, start_date, end_date, \
     parameters_json, status, idempotency_key, parent_sweep_id, attempt_count, \
     failure_reason, created_at, updated_at";

/// 잡 Repository.
pub struct JobRepository;

impl JobRepository {
    /// 새 잡을 생성합니다.
    ///
    /// 멱등성 키가 이미 존재하면 [`StoreError::DuplicateKey`]를 반환합니다.
    pub async fn create(pool: &PgPool, new_job: &NewJob) -> StoreResult<JobRecord> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            INSERT INTO backtest_jobs
                (strategy_name, symbol, start_date, end_date, parameters_json,
                 status, idempotency_key, parent_sweep_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(&new_job.strategy_name)
        .bind(&new_job.symbol)
        .bind(new_job.start_date)
        .bind(new_job.end_date)
        .bind(&new_job.parameters_json)
        .bind(new_job.status.as_str())
        .bind(&new_job.idempotency_key)
        .bind(new_job.parent_sweep_id)
        .fetch_one(pool)
        .await
        .map_err(StoreError::from_insert)?;

        debug!("Created job {} ({})", row.id, row.strategy_name);
        row.try_into()
    }

    /// id로 잡을 조회합니다 (잠금 없음).
    pub async fn find_by_id(pool: &PgPool, id: i64) -> StoreResult<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM backtest_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        row.map(JobRecord::try_from).transpose()
    }

    /// 멱등성 키로 잡을 조회합니다.
    pub async fn find_by_idempotency_key(
        pool: &PgPool,
        idempotency_key: &str,
    ) -> StoreResult<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM backtest_jobs WHERE idempotency_key = $1"
        ))
        .bind(idempotency_key)
        .fetch_optional(pool)
        .await?;

        row.map(JobRecord::try_from).transpose()
    }

    /// 잡 행을 배타 잠금과 함께 조회합니다.
    ///
    /// 같은 행을 잠그려는 다른 트랜잭션은 이 트랜잭션이 끝날 때까지
    /// 블로킹됩니다. 상태 전이를 결정하는 모든 읽기는 이 잠금 아래에서
    /// 일어나야 합니다.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: i64,
    ) -> StoreResult<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM backtest_jobs WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        row.map(JobRecord::try_from).transpose()
    }

    /// 잡의 가변 필드를 저장합니다.
    ///
    /// 메모리의 `version`이 저장된 토큰과 일치할 때만 성공하며, 성공 시
    /// 토큰을 증가시키고 레코드에 반영합니다. 불일치는
    /// [`StoreError::StaleVersion`]입니다: 다른 경로가 행을 먼저 변경한
    /// 것이므로 호출자는 잠금 아래에서 다시 읽어야 합니다.
    pub async fn save(conn: &mut PgConnection, job: &mut JobRecord) -> StoreResult<()> {
        let updated: Option<(i64, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
            r#"
            UPDATE backtest_jobs
            SET status = $3,
                attempt_count = $4,
                failure_reason = $5,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING version, updated_at
            "#,
        )
        .bind(job.id)
        .bind(job.version)
        .bind(job.status.as_str())
        .bind(job.attempt_count)
        .bind(&job.failure_reason)
        .fetch_optional(conn)
        .await?;

        match updated {
            Some((version, updated_at)) => {
                job.version = version;
                job.updated_at = updated_at;
                Ok(())
            }
            None => Err(StoreError::StaleVersion),
        }
    }

    /// 스윕 자식 중 특정 상태의 잡 수를 셉니다.
    pub async fn count_children_by_status(
        conn: &mut PgConnection,
        sweep_id: i64,
        status: JobStatus,
    ) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM backtest_jobs WHERE parent_sweep_id = $1 AND status = $2",
        )
        .bind(sweep_id)
        .bind(status.as_str())
        .fetch_one(conn)
        .await?;

        Ok(count)
    }

    /// 스윕의 자식 잡 목록 (id 오름차순).
    pub async fn list_children(pool: &PgPool, sweep_id: i64) -> StoreResult<Vec<JobRecord>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM backtest_jobs WHERE parent_sweep_id = $1 ORDER BY id ASC"
        ))
        .bind(sweep_id)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(JobRecord::try_from).collect()
    }
}
