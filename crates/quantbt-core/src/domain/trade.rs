//! 백테스트 중 체결된 거래 기록.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 거래 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

/// 백테스트 시뮬레이션에서 체결된 단일 거래.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// 체결일
    pub date: NaiveDate,
    /// 심볼
    pub symbol: String,
    /// 거래 방향
    pub action: TradeAction,
    /// 체결가 (종가 기준)
    pub price: Decimal,
    /// 수량
    pub quantity: i64,
    /// 수수료
    pub commission: Decimal,
}

impl Trade {
    /// 수수료 포함 총 거래 금액.
    pub fn total_value(&self) -> Decimal {
        self.price * Decimal::from(self.quantity) + self.commission
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_total_value() {
        let trade = Trade {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            symbol: "AAPL".to_string(),
            action: TradeAction::Buy,
            price: dec!(185.50),
            quantity: 10,
            commission: dec!(1.25),
        };

        assert_eq!(trade.total_value(), dec!(1856.25));
    }
}
