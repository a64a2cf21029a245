//! 단순 매수 후 보유 전략.

use quantbt_core::MarketPoint;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use super::Strategy;
use crate::portfolio::Portfolio;

/// 첫 틱에서 가능한 최대 수량을 매수하고 끝까지 보유합니다.
pub struct BuyAndHoldStrategy {
    has_bought: bool,
}

impl BuyAndHoldStrategy {
    pub fn new() -> Self {
        Self { has_bought: false }
    }
}

impl Default for BuyAndHoldStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for BuyAndHoldStrategy {
    fn on_tick(&mut self, point: &MarketPoint, portfolio: &mut Portfolio) {
        if self.has_bought || portfolio.cash() <= Decimal::ZERO {
            return;
        }

        let shares_to_buy = (portfolio.cash() / point.close)
            .floor()
            .to_i64()
            .unwrap_or(0);

        if shares_to_buy > 0 {
            portfolio.buy(point, shares_to_buy);
            self.has_bought = true;
            debug!(
                "BuyAndHold: bought {} shares at {} on {}",
                shares_to_buy, point.close, point.date
            );
        }
    }

    fn on_finish(&mut self, portfolio: &mut Portfolio) {
        debug!(
            "BuyAndHold finished. shares={}, cash={}",
            portfolio.shares(),
            portfolio.cash()
        );
    }

    fn name(&self) -> &str {
        "BuyAndHold"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn point(day: u32, close: Decimal) -> MarketPoint {
        MarketPoint {
            symbol: "AAPL".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000_000,
        }
    }

    #[test]
    fn test_buys_once_on_first_tick() {
        let mut strategy = BuyAndHoldStrategy::new();
        let mut portfolio = Portfolio::new(dec!(10000));

        strategy.on_tick(&point(2, dec!(100)), &mut portfolio);
        assert_eq!(portfolio.shares(), 100);

        // 이후 틱에서는 추가 매수하지 않음
        strategy.on_tick(&point(3, dec!(50)), &mut portfolio);
        assert_eq!(portfolio.shares(), 100);
        assert_eq!(portfolio.trades().len(), 1);
    }

    #[test]
    fn test_fractional_shares_are_floored() {
        let mut strategy = BuyAndHoldStrategy::new();
        let mut portfolio = Portfolio::new(dec!(1000));

        strategy.on_tick(&point(2, dec!(333)), &mut portfolio);
        assert_eq!(portfolio.shares(), 3);
        assert_eq!(portfolio.cash(), dec!(1));
    }
}
