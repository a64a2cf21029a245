//! 큐 에러 타입.

use thiserror::Error;

/// 큐 백엔드 에러.
#[derive(Debug, Error)]
pub enum QueueError {
    /// 백엔드 연결/명령 에러
    #[error("queue backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        QueueError::Backend(err.to_string())
    }
}

/// 큐 작업을 위한 Result 타입.
pub type QueueResult<T> = Result<T, QueueError>;
