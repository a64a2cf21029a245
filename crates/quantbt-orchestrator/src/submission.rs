//! 잡 제출 서비스.
//!
//! 새 잡을 받아 멱등성 키를 계산하고, 기존 상태와 조정한 뒤 큐에 넣습니다.
//! 동일 스펙의 재제출은 항상 같은 잡 id를 반환합니다.

use chrono::NaiveDate;
use quantbt_core::JobStatus;
use quantbt_queue::{JobQueue, QueueError};
use quantbt_store::{JobRecord, JobRepository, NewJob, ResultRecord, ResultRepository, StoreError};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::idempotency;
use crate::metrics;

/// 제출 에러.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// 검증이 끝난 제출 요청.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub strategy_name: String,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// 불투명한 전략 파라미터. 오케스트레이션 레이어는 해싱과 전달만 합니다.
    pub parameters: Value,
    pub initial_capital: Decimal,
}

/// 제출 결과.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub job_id: i64,
    pub status: JobStatus,
    pub message: String,
    /// 동일 스펙의 기존 잡이 반환된 경우 true
    pub is_existing: bool,
    /// 기존 잡이 COMPLETED인 경우 저장된 결과
    pub result: Option<ResultRecord>,
}

/// 잡 제출 서비스.
pub struct SubmissionService {
    pool: PgPool,
    queue: Arc<dyn JobQueue>,
}

impl SubmissionService {
    pub fn new(pool: PgPool, queue: Arc<dyn JobQueue>) -> Self {
        Self { pool, queue }
    }

    /// 백테스트 잡을 제출합니다.
    ///
    /// 동일 스펙이 이미 존재하면 기존 잡의 상태에 맞는 응답을 반환하며
    /// 어떤 큐 부수효과도 일으키지 않습니다. 재시도는 오직 Executor가
    /// 주도합니다.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmissionOutcome, SubmitError> {
        info!(
            "Received backtest submission for strategy: {}, symbol: {}",
            request.strategy_name, request.symbol
        );

        // 초기 자본을 파라미터 블롭에 병합한 뒤 정규화합니다.
        // 커널은 파라미터에서 초기 자본을 읽습니다.
        let mut parameters = request.parameters.clone();
        if let Value::Object(ref mut map) = parameters {
            map.insert(
                "initialCapital".to_string(),
                Value::String(request.initial_capital.normalize().to_string()),
            );
        }

        let idempotency_key = idempotency::submission_key(
            &request.strategy_name,
            &request.symbol,
            request.start_date,
            request.end_date,
            &parameters,
        );
        debug!("Generated idempotency key: {}", idempotency_key);

        if let Some(existing) =
            JobRepository::find_by_idempotency_key(&self.pool, &idempotency_key).await?
        {
            info!(
                "Idempotent request detected for job {} with status {}",
                existing.id, existing.status
            );
            return self.existing_job_outcome(existing).await;
        }

        let new_job = NewJob {
            strategy_name: request.strategy_name.clone(),
            symbol: request.symbol.clone(),
            start_date: request.start_date,
            end_date: request.end_date,
            parameters_json: idempotency::canonical_json(&parameters),
            status: JobStatus::Submitted,
            idempotency_key: idempotency_key.clone(),
            parent_sweep_id: None,
        };

        let job = match JobRepository::create(&self.pool, &new_job).await {
            Ok(job) => job,
            Err(StoreError::DuplicateKey) => {
                // 동시 제출 경쟁에서 진 쪽: unique 제약이 해소했으므로
                // 재조회하여 기존 잡을 반환합니다.
                info!("Lost insert race for key {}, returning winner", idempotency_key);
                let existing =
                    JobRepository::find_by_idempotency_key(&self.pool, &idempotency_key)
                        .await?
                        .ok_or(StoreError::DuplicateKey)?;
                return self.existing_job_outcome(existing).await;
            }
            Err(e) => return Err(e.into()),
        };

        info!("Created new backtest job with ID: {}", job.id);
        metrics::record_job_submitted();

        // 큐에 넣은 뒤 QUEUED로 전이합니다. 워커가 그 사이에 잡을
        // 집어갔다면(SUBMITTED 허용) 상태를 되돌리지 않습니다.
        self.queue.push(job.id).await?;
        let status = self.mark_queued(job.id).await?;

        info!("Job {} pushed to queue with status {}", job.id, status);

        Ok(SubmissionOutcome {
            job_id: job.id,
            status,
            message: "Job queued successfully".to_string(),
            is_existing: false,
            result: None,
        })
    }

    /// SUBMITTED → QUEUED 전이. 잠금 아래에서 상태를 재확인합니다.
    async fn mark_queued(&self, job_id: i64) -> Result<JobStatus, SubmitError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let Some(mut job) = JobRepository::lock_for_update(&mut tx, job_id).await? else {
            warn!("Job {} vanished before QUEUED transition", job_id);
            return Ok(JobStatus::Submitted);
        };

        if job.status != JobStatus::Submitted {
            // 워커가 이미 소유권을 가져감
            return Ok(job.status);
        }

        job.status = JobStatus::Queued;
        match JobRepository::save(&mut tx, &mut job).await {
            Ok(()) => {
                tx.commit().await.map_err(StoreError::from)?;
                Ok(JobStatus::Queued)
            }
            Err(StoreError::StaleVersion) => {
                warn!("Job {} was updated concurrently during QUEUED transition", job_id);
                Ok(job.status)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 기존 잡의 상태에 맞는 응답을 만듭니다.
    async fn existing_job_outcome(
        &self,
        job: JobRecord,
    ) -> Result<SubmissionOutcome, SubmitError> {
        let (message, result) = match job.status {
            JobStatus::Completed => {
                let result = ResultRepository::find_latest_by_job_id(&self.pool, job.id).await?;
                if result.is_none() {
                    warn!("Job {} marked COMPLETED but no result found", job.id);
                    (
                        "Job completed but results not found".to_string(),
                        None,
                    )
                } else {
                    (
                        "Job already completed. Returning cached results.".to_string(),
                        result,
                    )
                }
            }
            JobStatus::Running => ("Job is currently being processed".to_string(), None),
            JobStatus::Queued => (
                "Job is queued and waiting for processing".to_string(),
                None,
            ),
            JobStatus::Submitted => (
                "Job submitted and awaiting queue placement".to_string(),
                None,
            ),
            JobStatus::Failed => (
                format!("Job previously failed after {} attempts", job.attempt_count),
                None,
            ),
        };

        Ok(SubmissionOutcome {
            job_id: job.id,
            status: job.status,
            message,
            is_existing: true,
            result,
        })
    }
}
