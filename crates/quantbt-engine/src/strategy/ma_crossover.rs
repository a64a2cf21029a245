//! 이동평균 교차 전략.

use std::collections::VecDeque;

use quantbt_core::MarketPoint;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use super::Strategy;
use crate::error::{EngineError, EngineResult};
use crate::portfolio::Portfolio;

/// 이동평균 교차 전략.
///
/// 단기 이동평균이 장기 이동평균을 상향 돌파(골든 크로스)하면 매수하고,
/// 하향 돌파(데드 크로스)하면 전량 매도합니다.
pub struct MovingAverageCrossoverStrategy {
    name: String,
    short_period: usize,
    long_period: usize,
    short_window: VecDeque<Decimal>,
    long_window: VecDeque<Decimal>,
    prev_short_ma: Option<Decimal>,
    prev_long_ma: Option<Decimal>,
}

impl MovingAverageCrossoverStrategy {
    /// 단기/장기 기간으로 전략을 생성합니다. 단기 < 장기여야 합니다.
    pub fn new(short_period: usize, long_period: usize) -> EngineResult<Self> {
        if short_period == 0 || short_period >= long_period {
            return Err(EngineError::Config(format!(
                "short period must be positive and less than long period: {} >= {}",
                short_period, long_period
            )));
        }

        Ok(Self {
            name: format!("MovingAverageCrossover({},{})", short_period, long_period),
            short_period,
            long_period,
            short_window: VecDeque::with_capacity(short_period + 1),
            long_window: VecDeque::with_capacity(long_period + 1),
            prev_short_ma: None,
            prev_long_ma: None,
        })
    }

    fn moving_average(window: &VecDeque<Decimal>) -> Decimal {
        let sum: Decimal = window.iter().copied().sum();
        sum / Decimal::from(window.len() as u64)
    }
}

impl Strategy for MovingAverageCrossoverStrategy {
    fn on_tick(&mut self, point: &MarketPoint, portfolio: &mut Portfolio) {
        let close = point.close;

        self.short_window.push_back(close);
        self.long_window.push_back(close);
        if self.short_window.len() > self.short_period {
            self.short_window.pop_front();
        }
        if self.long_window.len() > self.long_period {
            self.long_window.pop_front();
        }

        // 장기 윈도우가 채워질 때까지 대기
        if self.long_window.len() < self.long_period {
            return;
        }

        let short_ma = Self::moving_average(&self.short_window);
        let long_ma = Self::moving_average(&self.long_window);

        if let (Some(prev_short), Some(prev_long)) = (self.prev_short_ma, self.prev_long_ma) {
            let golden_cross = prev_short < prev_long && short_ma > long_ma;
            let death_cross = prev_short > prev_long && short_ma < long_ma;

            if golden_cross {
                let shares_to_buy = (portfolio.cash() / close).floor().to_i64().unwrap_or(0);
                if shares_to_buy > 0 {
                    portfolio.buy(point, shares_to_buy);
                    debug!(
                        "MA crossover: BUY {} at {} on {} (short={}, long={})",
                        shares_to_buy, close, point.date, short_ma, long_ma
                    );
                }
            } else if death_cross {
                let shares_to_sell = portfolio.shares();
                if shares_to_sell > 0 {
                    portfolio.sell(point, shares_to_sell);
                    debug!(
                        "MA crossover: SELL {} at {} on {} (short={}, long={})",
                        shares_to_sell, close, point.date, short_ma, long_ma
                    );
                }
            }
        }

        self.prev_short_ma = Some(short_ma);
        self.prev_long_ma = Some(long_ma);
    }

    fn on_finish(&mut self, portfolio: &mut Portfolio) {
        debug!(
            "MA crossover finished. shares={}, cash={}",
            portfolio.shares(),
            portfolio.cash()
        );
    }

    fn name(&self) -> &str {
        &self.name
    }
}
