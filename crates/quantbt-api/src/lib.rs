//! # Quantbt API
//!
//! 백테스트 오케스트레이터의 REST API 서버.
//!
//! - `POST /backtests` - 백테스트 잡 제출 (멱등)
//! - `POST /backtests/sweeps` - 파라미터 스윕 제출
//! - `GET /backtests/sweeps/{id}` - 스윕 상태/최적 결과 조회
//! - `POST /market-data/{symbol}/csv` - CSV 시장 데이터 수집
//! - `GET /health` - 헬스 체크
//! - `GET /metrics` - Prometheus 메트릭

pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;
