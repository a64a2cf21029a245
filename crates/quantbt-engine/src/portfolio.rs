//! 백테스트 포트폴리오.

use quantbt_core::{MarketPoint, Trade, TradeAction};
use rust_decimal::Decimal;

/// 백테스트 실행 중의 현금/주식 포지션과 거래 이력.
///
/// 각 백테스트 실행이 자신만의 인스턴스를 소유합니다. 하나의 실행 동안
/// 단일 스레드에서만 변경되므로 동기화가 필요 없습니다.
#[derive(Debug, Clone)]
pub struct Portfolio {
    cash: Decimal,
    shares: i64,
    trades: Vec<Trade>,
    initial_capital: Decimal,
}

impl Portfolio {
    /// 초기 자본으로 새 포트폴리오를 생성합니다.
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            cash: initial_capital,
            shares: 0,
            trades: Vec::new(),
            initial_capital,
        }
    }

    /// 보유 현금.
    pub fn cash(&self) -> Decimal {
        self.cash
    }

    /// 보유 주식 수.
    pub fn shares(&self) -> i64 {
        self.shares
    }

    /// 초기 자본.
    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    /// 지금까지 체결된 거래 목록.
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// 매수 주문을 체결합니다.
    ///
    /// 종가 기준으로 체결되며, 현금이 부족하면 조용히 무시됩니다.
    pub fn buy(&mut self, point: &MarketPoint, quantity: i64) {
        if quantity <= 0 {
            return;
        }
        let cost = point.close * Decimal::from(quantity);
        if self.cash < cost {
            return;
        }

        self.cash -= cost;
        self.shares += quantity;
        self.trades.push(Trade {
            date: point.date,
            symbol: point.symbol.clone(),
            action: TradeAction::Buy,
            price: point.close,
            quantity,
            commission: Decimal::ZERO,
        });
    }

    /// 매도 주문을 체결합니다.
    ///
    /// 보유 수량이 부족하면 조용히 무시됩니다.
    pub fn sell(&mut self, point: &MarketPoint, quantity: i64) {
        if quantity <= 0 || self.shares < quantity {
            return;
        }
        let proceeds = point.close * Decimal::from(quantity);

        self.cash += proceeds;
        self.shares -= quantity;
        self.trades.push(Trade {
            date: point.date,
            symbol: point.symbol.clone(),
            action: TradeAction::Sell,
            price: point.close,
            quantity,
            commission: Decimal::ZERO,
        });
    }

    /// 현재가 기준 포트폴리오 총 가치 (현금 + 주식 평가액).
    pub fn portfolio_value(&self, current_price: Decimal) -> Decimal {
        self.cash + current_price * Decimal::from(self.shares)
    }

    /// 거래 이력을 소비하며 반환합니다.
    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }
}
