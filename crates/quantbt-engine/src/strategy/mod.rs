//! Strategy trait 정의와 전략 레지스트리.

mod buy_and_hold;
mod ma_crossover;

pub use buy_and_hold::BuyAndHoldStrategy;
pub use ma_crossover::MovingAverageCrossoverStrategy;

use quantbt_core::MarketPoint;
use serde_json::Value;
use tracing::warn;

use crate::error::EngineResult;
use crate::portfolio::Portfolio;

/// 트레이딩 전략 구현을 위한 Strategy trait.
///
/// 엔진은 시리즈의 각 포인트에 대해 시간순으로 `on_tick`을 호출하고,
/// 시리즈가 끝나면 `on_finish`를 한 번 호출합니다.
pub trait Strategy: Send {
    /// 새 시장 데이터 포인트 수신 시 호출.
    fn on_tick(&mut self, point: &MarketPoint, portfolio: &mut Portfolio);

    /// 모든 데이터 처리 후 호출.
    fn on_finish(&mut self, portfolio: &mut Portfolio);

    /// 전략 이름 반환.
    fn name(&self) -> &str;
}

/// 이름과 파라미터로 전략 인스턴스를 생성하는 레지스트리.
///
/// 오케스트레이션 레이어는 파라미터를 파싱하지 않습니다. 불투명한 JSON
/// 블롭이 여기서 처음 해석됩니다.
pub struct StrategyRegistry;

impl StrategyRegistry {
    /// 전략 이름과 JSON 파라미터로 전략을 생성합니다.
    ///
    /// 알 수 없는 이름은 경고 로그와 함께 buy-and-hold로 대체됩니다.
    /// 파라미터가 잘못된 경우(예: 단기 기간 >= 장기 기간)는 에러입니다.
    pub fn create(strategy_name: &str, parameters: &Value) -> EngineResult<Box<dyn Strategy>> {
        match strategy_name.to_lowercase().as_str() {
            "buyandhold" | "buy_and_hold" => Ok(Box::new(BuyAndHoldStrategy::new())),

            "movingaveragecrossover" | "ma_crossover" => {
                let short_period = parameters
                    .get("shortPeriod")
                    .and_then(Value::as_u64)
                    .unwrap_or(10) as usize;
                let long_period = parameters
                    .get("longPeriod")
                    .and_then(Value::as_u64)
                    .unwrap_or(50) as usize;

                Ok(Box::new(MovingAverageCrossoverStrategy::new(
                    short_period,
                    long_period,
                )?))
            }

            other => {
                warn!("Unknown strategy: {}, defaulting to BuyAndHold", other);
                Ok(Box::new(BuyAndHoldStrategy::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_buy_and_hold() {
        let strategy = StrategyRegistry::create("BuyAndHold", &json!({})).unwrap();
        assert_eq!(strategy.name(), "BuyAndHold");
    }

    #[test]
    fn test_create_ma_crossover_with_params() {
        let strategy =
            StrategyRegistry::create("ma_crossover", &json!({"shortPeriod": 5, "longPeriod": 20}))
                .unwrap();
        assert_eq!(strategy.name(), "MovingAverageCrossover(5,20)");
    }

    #[test]
    fn test_create_ma_crossover_defaults() {
        let strategy = StrategyRegistry::create("MovingAverageCrossover", &json!({})).unwrap();
        assert_eq!(strategy.name(), "MovingAverageCrossover(10,50)");
    }

    #[test]
    fn test_invalid_ma_periods() {
        let result =
            StrategyRegistry::create("ma_crossover", &json!({"shortPeriod": 50, "longPeriod": 10}));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_strategy_falls_back() {
        let strategy = StrategyRegistry::create("momentum", &json!({})).unwrap();
        assert_eq!(strategy.name(), "BuyAndHold");
    }
}
