//! # Quantbt Store
//!
//! 잡, 스윕, 결과의 트랜잭션 영속성 레이어.
//!
//! 잡 행 잠금(`SELECT ... FOR UPDATE`)이 라이프사이클의 유일한 조정
//! 프리미티브입니다. 그 위에 프로세스 내 mutex를 겹치지 않습니다.
//! 낙관적 토큰(`version` 컬럼)은 별도 트랜잭션 경로(실패 처리)가 행을
//! 변경했음을 감지합니다.

mod error;
mod jobs;
mod records;
mod results;
pub mod schema;
mod sweeps;

pub use error::{StoreError, StoreResult};
pub use jobs::JobRepository;
pub use records::{
    JobRecord, NewJob, NewResult, NewSweep, ResultRecord, SweepRecord,
};
pub use results::ResultRepository;
pub use sweeps::SweepRepository;
