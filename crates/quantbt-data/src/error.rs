//! 시장 데이터 에러 타입.

use thiserror::Error;

/// 시장 데이터 에러.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 에러
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// CSV 파싱 에러
    #[error("csv parse error: {0}")]
    CsvParse(String),
}

/// 데이터 작업을 위한 Result 타입.
pub type DataResult<T> = Result<T, DataError>;
