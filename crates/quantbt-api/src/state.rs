//! 모든 핸들러에서 공유되는 애플리케이션 상태.

use std::sync::Arc;

use quantbt_orchestrator::{SubmissionService, SweepService};
use quantbt_queue::RedisJobQueue;
use sqlx::PgPool;

/// 애플리케이션 공유 상태.
///
/// Axum의 State extractor를 통해 핸들러에 주입됩니다.
#[derive(Clone)]
pub struct AppState {
    /// 잡 제출 서비스
    pub submissions: Arc<SubmissionService>,
    /// 스윕 코디네이터
    pub sweeps: Arc<SweepService>,
    /// 데이터베이스 연결 풀
    pub pool: PgPool,
    /// Redis 큐 (헬스 체크용; 인메모리 큐 배포에서는 None)
    pub redis_queue: Option<RedisJobQueue>,
    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// API 버전
    pub version: String,
}

impl AppState {
    pub fn new(
        submissions: Arc<SubmissionService>,
        sweeps: Arc<SweepService>,
        pool: PgPool,
        redis_queue: Option<RedisJobQueue>,
    ) -> Self {
        Self {
            submissions,
            sweeps,
            pool,
            redis_queue,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 서버 업타임(초) 반환.
    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }

    /// 데이터베이스 연결 상태 확인.
    pub async fn is_db_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    /// 큐 백엔드 상태 확인. 인메모리 큐는 항상 정상으로 간주합니다.
    pub async fn is_queue_healthy(&self) -> bool {
        match &self.redis_queue {
            Some(queue) => queue.health_check().await.unwrap_or(false),
            None => true,
        }
    }
}
