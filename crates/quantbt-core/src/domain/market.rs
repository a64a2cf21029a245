//! 일봉 시장 데이터 포인트.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 단일 심볼의 하루치 OHLCV 데이터.
///
/// (symbol, date) 쌍으로 유일하며, 백테스트 엔진은 날짜 오름차순으로
/// 정렬된 시리즈를 기대합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPoint {
    /// 심볼 (예: "AAPL")
    pub symbol: String,
    /// 거래일
    pub date: NaiveDate,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: i64,
}
