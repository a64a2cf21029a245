//! 백테스트 엔진 에러 타입.

use thiserror::Error;

/// 백테스트 커널 에러.
#[derive(Debug, Error)]
pub enum EngineError {
    /// 설정 오류
    #[error("invalid backtest config: {0}")]
    Config(String),

    /// 데이터 오류
    #[error("market data error: {0}")]
    Data(String),

    /// 전략 오류
    #[error("strategy error: {0}")]
    Strategy(String),
}

/// 엔진 작업을 위한 Result 타입.
pub type EngineResult<T> = Result<T, EngineError>;
