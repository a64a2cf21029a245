//! 오케스트레이션 메트릭.
//!
//! 잡 라이프사이클 카운터와 실행 시간 히스토그램을 기록합니다.
//! 메트릭은 관측용이며 정확성과 무관합니다. 기록 실패는 무시됩니다.

use metrics::{counter, histogram};

/// 잡 제출 기록.
pub fn record_job_submitted() {
    counter!("backtest_jobs_submitted_total").increment(1);
}

/// 잡 완료와 실행 시간 기록.
pub fn record_job_completed(execution_time_ms: u64) {
    counter!("backtest_jobs_completed_total").increment(1);
    histogram!("backtest_execution_time_seconds").record(execution_time_ms as f64 / 1000.0);
}

/// 최종 실패 기록.
pub fn record_job_failed() {
    counter!("backtest_jobs_failed_total").increment(1);
}

/// 재시도 기록.
pub fn record_job_retried() {
    counter!("backtest_jobs_retried_total").increment(1);
}

/// 스윕 제출 기록.
pub fn record_sweep_submitted(total_children: u64) {
    counter!("backtest_sweeps_submitted_total").increment(1);
    counter!("backtest_sweep_children_total").increment(total_children);
}
