//! # Quantbt Engine
//!
//! 백테스트 계산 커널.
//!
//! 과거 시장 데이터 시리즈에 대해 전략을 시뮬레이션하고 성과 지표를
//! 계산합니다. 이 크레이트는 순수 계산만 담당하며, 잡 오케스트레이션이나
//! 영속성에 대해서는 알지 못합니다.
//!
//! 하나의 백테스트 실행은 자신만의 [`Portfolio`]를 소유합니다.
//! Portfolio는 동시성 안전하지 않으며 그럴 필요도 없습니다.

mod engine;
mod error;
mod metrics;
mod portfolio;
mod strategy;

pub use engine::{BacktestEngine, EngineConfig, EngineReport};
pub use error::{EngineError, EngineResult};
pub use metrics::{
    cagr, max_drawdown, sharpe_ratio, sortino_ratio, total_return, volatility, win_rate,
    TRADING_DAYS_PER_YEAR,
};
pub use portfolio::Portfolio;
pub use strategy::{
    BuyAndHoldStrategy, MovingAverageCrossoverStrategy, Strategy, StrategyRegistry,
};
