//! # Quantbt Core
//!
//! 분산 백테스트 오케스트레이터의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 잡 라이프사이클 상태
//! - 시장 데이터 포인트
//! - 거래 기록
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use logging::*;
