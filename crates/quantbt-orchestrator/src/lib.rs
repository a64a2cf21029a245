//! # Quantbt Orchestrator
//!
//! 잡 오케스트레이션 서브시스템.
//!
//! 제출 → 큐 → 실행 → 종결 상태로 이어지는 잡 라이프사이클 상태 기계,
//! 멱등성/중복 제거 프로토콜, 잡당 최대 하나의 동시 실행을 보장하는
//! 큐+잠금 프로토콜, 한정된 재시도와 지수 백오프, 그리고 N개의 자식 잡을
//! 펼치고 최적 결과를 집계하는 파라미터 스윕 코디네이터를 포함합니다.

pub mod executor;
pub mod idempotency;
pub mod metrics;
pub mod submission;
pub mod sweep;
pub mod worker;

pub use executor::{ExecuteError, Executor, JobSeed};
pub use submission::{SubmissionOutcome, SubmissionService, SubmitError, SubmitRequest};
pub use sweep::{
    BestChild, StrategyGrid, SweepError, SweepOutcome, SweepRequest, SweepService, SweepStatus,
};
pub use worker::{JobPreview, JobRunner, Worker, WorkerPool};
