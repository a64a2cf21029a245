//! Prometheus 메트릭 설정.
//!
//! 잡 라이프사이클 카운터와 실행 시간 히스토그램을 수집하고
//! `/metrics` 엔드포인트로 노출합니다.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Prometheus 메트릭 레코더를 설정하고 핸들을 반환합니다.
///
/// # 패닉
///
/// 레코더가 이미 설치되어 있으면 패닉합니다.
pub fn setup_metrics_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        // 백테스트 실행 시간 히스토그램 버킷 설정
        .set_buckets_for_metric(
            Matcher::Full("backtest_execution_time_seconds".to_string()),
            &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
        )
        .expect("histogram bucket configuration")
        .install_recorder()
        .expect("Prometheus recorder installation")
}
