//! CSV 시장 데이터 수집.
//!
//! Yahoo Finance 형식(Date,Open,High,Low,Close,Volume)의 CSV를 파싱하여
//! `market_data` 테이블에 배치 저장합니다.

use chrono::NaiveDate;
use quantbt_core::MarketPoint;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::{DataError, DataResult};
use crate::repository::MarketDataRepository;

/// 배치 저장 단위.
const BATCH_SIZE: usize = 1000;

/// 지원하는 날짜 형식.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// CSV 텍스트를 파싱하여 시장 데이터 포인트 목록을 반환합니다.
///
/// 헤더 행과 파싱 불가능한 행은 경고와 함께 건너뜁니다.
pub fn parse_csv(symbol: &str, body: &str) -> Vec<MarketPoint> {
    let mut points = Vec::new();

    for (index, raw_line) in body.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        // 헤더 행 건너뛰기
        if index == 0 && line.to_lowercase().contains("date") {
            continue;
        }

        match parse_line(symbol, line) {
            Ok(point) => points.push(point),
            Err(e) => warn!("Failed to parse CSV line {:?}: {}", line, e),
        }
    }

    points
}

fn parse_line(symbol: &str, line: &str) -> DataResult<MarketPoint> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 6 {
        return Err(DataError::CsvParse(format!(
            "expected 6+ columns, got {}",
            parts.len()
        )));
    }

    let date = parse_date(parts[0])?;
    let open = parse_decimal(parts[1])?;
    let high = parse_decimal(parts[2])?;
    let low = parse_decimal(parts[3])?;
    let close = parse_decimal(parts[4])?;
    let volume: i64 = parts[5]
        .parse()
        .map_err(|_| DataError::CsvParse(format!("invalid volume: {}", parts[5])))?;

    Ok(MarketPoint {
        symbol: symbol.to_string(),
        date,
        open,
        high,
        low,
        close,
        volume,
    })
}

fn parse_date(value: &str) -> DataResult<NaiveDate> {
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(date);
        }
    }
    Err(DataError::CsvParse(format!("invalid date: {}", value)))
}

fn parse_decimal(value: &str) -> DataResult<Decimal> {
    Decimal::from_str(value).map_err(|_| DataError::CsvParse(format!("invalid number: {}", value)))
}

/// CSV 본문을 파싱하여 DB에 저장하고, 저장된 포인트 수를 반환합니다.
pub async fn ingest_csv(pool: &PgPool, symbol: &str, body: &str) -> DataResult<usize> {
    info!("Starting CSV ingestion for symbol: {}", symbol);

    let points = parse_csv(symbol, body);
    let mut inserted = 0;

    for chunk in points.chunks(BATCH_SIZE) {
        inserted += MarketDataRepository::save_batch(pool, chunk).await?;
    }

    info!(
        "CSV ingestion completed for {}: {} points saved",
        symbol, inserted
    );

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_csv_with_header() {
        let body = "Date,Open,High,Low,Close,Volume\n\
                    2024-01-02,185.00,186.50,184.20,185.64,52000000\n\
                    2024-01-03,184.50,185.90,183.80,184.25,48000000\n";

        let points = parse_csv("AAPL", body);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].close, dec!(185.64));
        assert_eq!(points[0].volume, 52_000_000);
        assert_eq!(points[1].symbol, "AAPL");
    }

    #[test]
    fn test_parse_csv_us_date_format() {
        let body = "01/02/2024,100,101,99,100.5,1000\n";
        let points = parse_csv("TEST", body);
        assert_eq!(points.len(), 1);
        assert_eq!(
            points[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
    }

    #[test]
    fn test_parse_csv_skips_bad_lines() {
        let body = "2024-01-02,185.00,186.50,184.20,185.64,52000000\n\
                    not,a,valid,row\n\
                    2024-01-03,bad-number,185.90,183.80,184.25,48000000\n";

        let points = parse_csv("AAPL", body);
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn test_parse_csv_empty_body() {
        assert!(parse_csv("AAPL", "").is_empty());
    }
}
