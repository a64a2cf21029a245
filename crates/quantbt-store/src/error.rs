//! 저장소 에러 타입.

use thiserror::Error;

/// PostgreSQL unique 위반 에러 코드.
const UNIQUE_VIOLATION: &str = "23505";

/// 잡 저장소 에러.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 멱등성 키 충돌. 동일 스펙이 이미 존재합니다.
    #[error("duplicate idempotency key")]
    DuplicateKey,

    /// 낙관적 토큰 불일치. 다른 경로가 행을 먼저 변경했습니다.
    #[error("stale version on save")]
    StaleVersion,

    /// 저장된 행이 도메인 타입으로 해석되지 않음
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),

    /// 데이터베이스 에러
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// INSERT 에러를 분류합니다. unique 위반이면 `DuplicateKey`가 됩니다.
    pub fn from_insert(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return StoreError::DuplicateKey;
            }
        }
        StoreError::Database(err)
    }
}

/// 저장소 작업을 위한 Result 타입.
pub type StoreResult<T> = Result<T, StoreError>;
