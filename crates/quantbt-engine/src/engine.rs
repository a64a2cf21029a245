//! 백테스팅 엔진.
//!
//! 과거 데이터 시리즈에 대해 전략을 틱 단위로 실행하고 성과를 분석합니다.

use quantbt_core::{MarketPoint, Trade};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::metrics;
use crate::portfolio::Portfolio;
use crate::strategy::Strategy;

/// 단일 백테스트 실행 설정.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 초기 자본금
    pub initial_capital: Decimal,
}

/// 백테스트 실행 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineReport {
    /// 총 수익률 (%)
    pub total_return: Decimal,
    /// 연평균 복리 수익률 (%)
    pub cagr: Decimal,
    /// 연율화 변동성 (%)
    pub volatility: Decimal,
    /// 샤프 비율
    pub sharpe_ratio: Decimal,
    /// 소르티노 비율
    pub sortino_ratio: Decimal,
    /// 최대 낙폭 (음수 %)
    pub max_drawdown: Decimal,
    /// 승률 (0~1)
    pub win_rate: Decimal,
    /// 최종 포트폴리오 가치
    pub final_value: Decimal,
    /// 체결된 거래 목록
    pub trades: Vec<Trade>,
    /// 자산 곡선 (틱별 포트폴리오 가치)
    pub equity_curve: Vec<Decimal>,
}

/// 백테스팅 엔진.
///
/// 각 실행이 자신만의 [`Portfolio`]를 생성하므로 엔진 자체는 상태가 없고
/// 여러 실행에서 재사용할 수 있습니다.
pub struct BacktestEngine;

impl BacktestEngine {
    /// 주어진 전략과 설정으로 백테스트를 실행합니다.
    pub fn run(
        strategy: &mut dyn Strategy,
        market_data: &[MarketPoint],
        config: &EngineConfig,
    ) -> EngineResult<EngineReport> {
        if config.initial_capital <= Decimal::ZERO {
            return Err(EngineError::Config(
                "initial capital must be positive".to_string(),
            ));
        }
        if market_data.is_empty() {
            return Err(EngineError::Data(
                "market data series is empty".to_string(),
            ));
        }

        info!(
            "Starting backtest - strategy: {}, data points: {}",
            strategy.name(),
            market_data.len()
        );

        let mut portfolio = Portfolio::new(config.initial_capital);
        let mut equity_curve = Vec::with_capacity(market_data.len());

        for point in market_data {
            strategy.on_tick(point, &mut portfolio);
            equity_curve.push(portfolio.portfolio_value(point.close));
        }

        strategy.on_finish(&mut portfolio);

        // on_finish가 포지션을 정리했을 수 있으므로 마지막 종가로 재평가
        let last_close = market_data[market_data.len() - 1].close;
        let final_value = portfolio.portfolio_value(last_close);
        let trading_days = market_data.len();

        let report = EngineReport {
            total_return: metrics::total_return(config.initial_capital, final_value),
            cagr: metrics::cagr(config.initial_capital, final_value, trading_days),
            volatility: metrics::volatility(&equity_curve),
            sharpe_ratio: metrics::sharpe_ratio(&equity_curve),
            sortino_ratio: metrics::sortino_ratio(&equity_curve),
            max_drawdown: metrics::max_drawdown(&equity_curve),
            win_rate: metrics::win_rate(portfolio.trades()),
            final_value,
            trades: portfolio.into_trades(),
            equity_curve,
        };

        info!(
            "Backtest completed - return: {}%, sharpe: {}, max drawdown: {}%",
            report.total_return, report.sharpe_ratio, report.max_drawdown
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::BuyAndHoldStrategy;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn series(closes: &[i64]) -> Vec<MarketPoint> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| MarketPoint {
                symbol: "TEST".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Days::new(i as u64),
                open: Decimal::from(c),
                high: Decimal::from(c),
                low: Decimal::from(c),
                close: Decimal::from(c),
                volume: 1000,
            })
            .collect()
    }

    #[test]
    fn test_rejects_empty_series() {
        let config = EngineConfig {
            initial_capital: dec!(10000),
        };
        let mut strategy = BuyAndHoldStrategy::new();
        assert!(BacktestEngine::run(&mut strategy, &[], &config).is_err());
    }

    #[test]
    fn test_rejects_non_positive_capital() {
        let config = EngineConfig {
            initial_capital: Decimal::ZERO,
        };
        let mut strategy = BuyAndHoldStrategy::new();
        assert!(BacktestEngine::run(&mut strategy, &series(&[100, 110]), &config).is_err());
    }

    #[test]
    fn test_buy_and_hold_rising_market() {
        let config = EngineConfig {
            initial_capital: dec!(10000),
        };
        let mut strategy = BuyAndHoldStrategy::new();
        let report =
            BacktestEngine::run(&mut strategy, &series(&[100, 110, 120, 130]), &config).unwrap();

        // 100주 매수, 130에 종료 = 13000
        assert_eq!(report.final_value, dec!(13000));
        assert_eq!(report.total_return, dec!(30));
        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.equity_curve.len(), 4);
        assert_eq!(report.max_drawdown, Decimal::ZERO);
    }

    #[test]
    fn test_equity_curve_tracks_each_tick() {
        let config = EngineConfig {
            initial_capital: dec!(1000),
        };
        let mut strategy = BuyAndHoldStrategy::new();
        let report =
            BacktestEngine::run(&mut strategy, &series(&[100, 120, 90]), &config).unwrap();

        // 10주 매수 후: 1000, 1200, 900
        assert_eq!(report.equity_curve, vec![dec!(1000), dec!(1200), dec!(900)]);
        assert!(report.max_drawdown < Decimal::ZERO);
    }
}
