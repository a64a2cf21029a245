//! 성과 지표 계산 모듈.
//!
//! 백테스트 자산 곡선과 거래 이력으로부터 성과 지표를 계산합니다:
//! - 총 수익률, CAGR
//! - 연율화 변동성
//! - 샤프 비율, 소르티노 비율 (무위험 이자율 0 가정)
//! - 최대 낙폭 (음수 백분율)
//! - 승률 (매수→매도 라운드트립 기준)

use quantbt_core::{Trade, TradeAction};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// 연간 거래일 수 (연율화 계산에 사용).
pub const TRADING_DAYS_PER_YEAR: u32 = 252;

/// 소르티노 비율 상한 (하락 변동성이 전혀 없는 경우).
const SORTINO_CAP: f64 = 999.9999;

/// 자산 곡선에서 일별 수익률을 계산합니다.
fn daily_returns(values: &[Decimal]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|pair| pair[0] > Decimal::ZERO)
        .filter_map(|pair| ((pair[1] - pair[0]) / pair[0]).to_f64())
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn to_decimal_4dp(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or_default()
        .round_dp(4)
}

/// 총 수익률 (백분율).
pub fn total_return(initial_capital: Decimal, final_value: Decimal) -> Decimal {
    if initial_capital.is_zero() {
        return Decimal::ZERO;
    }
    ((final_value - initial_capital) / initial_capital * Decimal::from(100)).round_dp(4)
}

/// 연평균 복리 수익률 (CAGR, 백분율).
///
/// 연간 252 거래일을 가정하며, 2~3 거래일 미만의 시리즈는 0을 반환합니다.
pub fn cagr(initial_capital: Decimal, final_value: Decimal, trading_days: usize) -> Decimal {
    if initial_capital <= Decimal::ZERO || trading_days == 0 {
        return Decimal::ZERO;
    }
    if final_value <= Decimal::ZERO {
        // 전액 손실
        return Decimal::from(-100);
    }

    let years = trading_days as f64 / TRADING_DAYS_PER_YEAR as f64;
    if years < 0.01 {
        return Decimal::ZERO;
    }

    let ratio = final_value.to_f64().unwrap_or(0.0) / initial_capital.to_f64().unwrap_or(1.0);
    to_decimal_4dp((ratio.powf(1.0 / years) - 1.0) * 100.0)
}

/// 연율화 변동성 (일별 수익률 표준편차 × √252, 백분율).
pub fn volatility(portfolio_values: &[Decimal]) -> Decimal {
    let returns = daily_returns(portfolio_values);
    if returns.is_empty() {
        return Decimal::ZERO;
    }

    let std = std_dev(&returns, mean(&returns));
    to_decimal_4dp(std * (TRADING_DAYS_PER_YEAR as f64).sqrt() * 100.0)
}

/// 샤프 비율 (무위험 이자율 0, 연율화).
pub fn sharpe_ratio(portfolio_values: &[Decimal]) -> Decimal {
    let returns = daily_returns(portfolio_values);
    if returns.is_empty() {
        return Decimal::ZERO;
    }

    let mean_return = mean(&returns);
    let std = std_dev(&returns, mean_return);
    if std == 0.0 {
        return Decimal::ZERO;
    }

    to_decimal_4dp(mean_return / std * (TRADING_DAYS_PER_YEAR as f64).sqrt())
}

/// 소르티노 비율 (하락 변동성만 패널티, 연율화).
///
/// 하락 수익률이 전혀 없으면 999.9999로 캡됩니다.
pub fn sortino_ratio(portfolio_values: &[Decimal]) -> Decimal {
    let returns = daily_returns(portfolio_values);
    if returns.is_empty() {
        return Decimal::ZERO;
    }

    let mean_return = mean(&returns);
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.is_empty() {
        return to_decimal_4dp(SORTINO_CAP);
    }

    let downside_variance = downside.iter().map(|r| r.powi(2)).sum::<f64>() / downside.len() as f64;
    let downside_deviation = downside_variance.sqrt();
    if downside_deviation == 0.0 {
        return Decimal::ZERO;
    }

    to_decimal_4dp(mean_return / downside_deviation * (TRADING_DAYS_PER_YEAR as f64).sqrt())
}

/// 최대 낙폭 (음수 백분율).
///
/// 고점 대비 최대 하락폭을 음수로 반환합니다. 예: -12.5 = 고점 대비 12.5% 하락.
pub fn max_drawdown(portfolio_values: &[Decimal]) -> Decimal {
    let Some(&first) = portfolio_values.first() else {
        return Decimal::ZERO;
    };

    let mut max_dd = Decimal::ZERO;
    let mut peak = first;

    for &value in portfolio_values {
        if value > peak {
            peak = value;
        }
        if peak > Decimal::ZERO {
            let drawdown = (peak - value) / peak * Decimal::from(100);
            if drawdown > max_dd {
                max_dd = drawdown;
            }
        }
    }

    -max_dd.round_dp(4)
}

/// 승률 (수익 라운드트립 비율, 0~1).
///
/// 연속된 매수→매도 쌍을 하나의 라운드트립으로 간주합니다.
pub fn win_rate(trades: &[Trade]) -> Decimal {
    if trades.len() < 2 {
        return Decimal::ZERO;
    }

    let mut winning = 0u32;
    let mut round_trips = 0u32;

    for pair in trades.windows(2) {
        if pair[0].action == TradeAction::Buy && pair[1].action == TradeAction::Sell {
            round_trips += 1;
            let profit = (pair[1].price - pair[0].price) * Decimal::from(pair[0].quantity);
            if profit > Decimal::ZERO {
                winning += 1;
            }
        }
    }

    if round_trips == 0 {
        return Decimal::ZERO;
    }

    (Decimal::from(winning) / Decimal::from(round_trips)).round_dp(4)
}
