//! 파라미터 스윕 Repository.

use sqlx::{PgConnection, PgPool};
use tracing::debug;

use crate::error::StoreResult;
use crate::records::{NewSweep, SweepRecord, SweepRow};

const SWEEP_COLUMNS: &str = "id, name, description, status, total_jobs, completed_jobs, \
     failed_jobs, optimization_metric, best_job_id, best_metric_value, \
     created_at, updated_at, completed_at";

/// 스윕 Repository.
pub struct SweepRepository;

impl SweepRepository {
    /// 새 스윕을 생성합니다.
    pub async fn create(pool: &PgPool, new_sweep: &NewSweep) -> StoreResult<SweepRecord> {
        let row = sqlx::query_as::<_, SweepRow>(&format!(
            r#"
            INSERT INTO parameter_sweeps
                (name, description, status, total_jobs, optimization_metric)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SWEEP_COLUMNS}
            "#
        ))
        .bind(&new_sweep.name)
        .bind(&new_sweep.description)
        .bind(new_sweep.status.as_str())
        .bind(new_sweep.total_jobs)
        .bind(&new_sweep.optimization_metric)
        .fetch_one(pool)
        .await?;

        debug!("Created sweep {} ({})", row.id, row.name);
        row.try_into()
    }

    /// id로 스윕을 조회합니다 (잠금 없음).
    pub async fn find_by_id(pool: &PgPool, id: i64) -> StoreResult<Option<SweepRecord>> {
        let row = sqlx::query_as::<_, SweepRow>(&format!(
            "SELECT {SWEEP_COLUMNS} FROM parameter_sweeps WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        row.map(SweepRecord::try_from).transpose()
    }

    /// 스윕 행을 배타 잠금과 함께 조회합니다.
    ///
    /// 동시에 종결되는 자식들의 카운터 갱신을 직렬화합니다.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: i64,
    ) -> StoreResult<Option<SweepRecord>> {
        let row = sqlx::query_as::<_, SweepRow>(&format!(
            "SELECT {SWEEP_COLUMNS} FROM parameter_sweeps WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        row.map(SweepRecord::try_from).transpose()
    }

    /// 스윕의 가변 필드를 저장합니다.
    ///
    /// 스윕 갱신은 항상 행 잠금 아래에서 일어나므로 버전 토큰이 없습니다.
    pub async fn save(conn: &mut PgConnection, sweep: &SweepRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE parameter_sweeps
            SET status = $2,
                completed_jobs = $3,
                failed_jobs = $4,
                best_job_id = $5,
                best_metric_value = $6,
                completed_at = $7,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(sweep.id)
        .bind(sweep.status.as_str())
        .bind(sweep.completed_jobs)
        .bind(sweep.failed_jobs)
        .bind(sweep.best_job_id)
        .bind(sweep.best_metric_value)
        .bind(sweep.completed_at)
        .execute(conn)
        .await?;

        Ok(())
    }
}
