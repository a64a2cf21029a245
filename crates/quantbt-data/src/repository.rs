//! 과거 시장 데이터 Repository.
//!
//! `market_data` 테이블의 CRUD 작업을 처리합니다.
//! (symbol, date) 유니크 제약으로 중복 수집을 방지합니다.

use chrono::NaiveDate;
use quantbt_core::MarketPoint;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::debug;

use crate::error::DataResult;

/// 시장 데이터 DB 레코드.
#[derive(Debug, Clone, sqlx::FromRow)]
struct MarketDataRecord {
    symbol: String,
    date: NaiveDate,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: i64,
}

impl From<MarketDataRecord> for MarketPoint {
    fn from(record: MarketDataRecord) -> Self {
        MarketPoint {
            symbol: record.symbol,
            date: record.date,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        }
    }
}

/// 과거 시장 데이터 Repository.
pub struct MarketDataRepository;

impl MarketDataRepository {
    /// 기간별 데이터 조회 (날짜 오름차순, 경계 포함).
    pub async fn find_range(
        pool: &PgPool,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DataResult<Vec<MarketPoint>> {
        let records = sqlx::query_as::<_, MarketDataRecord>(
            r#"
            SELECT symbol, date, open, high, low, close, volume
            FROM market_data
            WHERE symbol = $1
              AND date >= $2
              AND date <= $3
            ORDER BY date ASC
            "#,
        )
        .bind(symbol)
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await?;

        debug!(
            "Fetched {} market data points for {} from {} to {}",
            records.len(),
            symbol,
            start,
            end
        );

        Ok(records.into_iter().map(MarketPoint::from).collect())
    }

    /// 시장 데이터 배치 저장 (UNNEST 최적화).
    ///
    /// 중복 (symbol, date)는 기존 데이터를 업데이트합니다.
    pub async fn save_batch(pool: &PgPool, points: &[MarketPoint]) -> DataResult<usize> {
        if points.is_empty() {
            return Ok(0);
        }

        let symbols: Vec<&str> = points.iter().map(|p| p.symbol.as_str()).collect();
        let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
        let opens: Vec<Decimal> = points.iter().map(|p| p.open).collect();
        let highs: Vec<Decimal> = points.iter().map(|p| p.high).collect();
        let lows: Vec<Decimal> = points.iter().map(|p| p.low).collect();
        let closes: Vec<Decimal> = points.iter().map(|p| p.close).collect();
        let volumes: Vec<i64> = points.iter().map(|p| p.volume).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO market_data (symbol, date, open, high, low, close, volume)
            SELECT * FROM UNNEST(
                $1::text[],
                $2::date[],
                $3::decimal[],
                $4::decimal[],
                $5::decimal[],
                $6::decimal[],
                $7::bigint[]
            )
            ON CONFLICT (symbol, date) DO UPDATE SET
                open = EXCLUDED.open,
                high = EXCLUDED.high,
                low = EXCLUDED.low,
                close = EXCLUDED.close,
                volume = EXCLUDED.volume
            "#,
        )
        .bind(&symbols)
        .bind(&dates)
        .bind(&opens)
        .bind(&highs)
        .bind(&lows)
        .bind(&closes)
        .bind(&volumes)
        .execute(pool)
        .await?;

        debug!(
            "Saved {} market data points (affected: {})",
            points.len(),
            result.rows_affected()
        );

        Ok(result.rows_affected() as usize)
    }

    /// 기간 내 레코드 수 조회.
    pub async fn count_range(
        pool: &PgPool,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DataResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM market_data
            WHERE symbol = $1 AND date >= $2 AND date <= $3
            "#,
        )
        .bind(symbol)
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// 특정 심볼의 데이터 전체 삭제.
    pub async fn delete_symbol(pool: &PgPool, symbol: &str) -> DataResult<u64> {
        let result = sqlx::query("DELETE FROM market_data WHERE symbol = $1")
            .bind(symbol)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
