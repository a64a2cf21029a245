//! 잡 Executor.
//!
//! 워커가 소비하는 단일 진입점입니다. 잡 행을 잠그고, 상태를 전이하고,
//! 계산 커널을 호출하고, 결과를 영속화하고, 재시도 정책을 적용합니다.
//!
//! 행 잠금 + 상태 검사가 잡당 최대 한 번 실행(at-most-once)을 보장합니다.
//! 실패 처리는 항상 별도 트랜잭션에서 일어납니다. 커널 오류가 본
//! 트랜잭션을 롤백시키더라도 실패 기록은 남아야 하기 때문입니다.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use quantbt_core::{JobStatus, RetryConfig};
use quantbt_data::MarketDataGateway;
use quantbt_engine::{BacktestEngine, EngineConfig, StrategyRegistry};
use quantbt_queue::JobQueue;
use quantbt_store::{
    JobRecord, JobRepository, NewResult, ResultRepository, StoreError,
};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::metrics;
use crate::sweep::SweepService;

/// 실패 사유 최대 길이.
const MAX_FAILURE_REASON_LEN: usize = 1000;

/// 기본 초기 자본 (파라미터에 없을 때).
const DEFAULT_INITIAL_CAPITAL: i64 = 10_000;

/// 워커 레벨 실행 에러.
///
/// 잡 레벨 실패(커널 오류 등)는 재시도 정책으로 내부 처리되며 여기로
/// 나오지 않습니다. 이 에러는 저장소 백엔드 자체가 동작하지 않는
/// 경우이며, 워커는 로그 후 잠시 쉬고 재개합니다.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 큐에서 전달된, 오래되었을 수 있는 잡 뷰. id만 신뢰합니다.
#[derive(Debug, Clone, Copy)]
pub struct JobSeed {
    pub id: i64,
}

/// 잡 레벨 실패 분류.
///
/// 정책상 둘 다 재시도 한도의 적용을 받지만, 사유 문자열은 구분됩니다.
#[derive(Debug)]
enum JobFailure {
    /// 커널 전제조건 위반 (데이터 없음, 전략 생성 불가 등)
    Precondition(String),
    /// 그 밖의 일시적 실행 오류
    Transient(String),
}

impl JobFailure {
    fn reason(&self) -> &str {
        match self {
            JobFailure::Precondition(reason) | JobFailure::Transient(reason) => reason,
        }
    }
}

/// 잡 Executor.
pub struct Executor {
    pool: PgPool,
    queue: Arc<dyn JobQueue>,
    gateway: Arc<MarketDataGateway>,
    sweeps: Arc<SweepService>,
    retry: RetryConfig,
}

impl Executor {
    pub fn new(
        pool: PgPool,
        queue: Arc<dyn JobQueue>,
        gateway: Arc<MarketDataGateway>,
        sweeps: Arc<SweepService>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            pool,
            queue,
            gateway,
            sweeps,
            retry,
        }
    }

    /// 저장소 연결 풀.
    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 잡을 실행합니다.
    ///
    /// 잠금 아래에서 상태를 재검사하므로 중복 전달, 종결된 잡의 전달,
    /// 사라진 id의 전달 모두 부수효과 없이 처리됩니다.
    #[instrument(skip(self), fields(job_id = seed.id))]
    pub async fn execute(&self, seed: JobSeed) -> Result<(), ExecuteError> {
        let started = Instant::now();

        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let Some(mut job) = JobRepository::lock_for_update(&mut tx, seed.id).await? else {
            warn!("Job {} not found, dropping dispatch", seed.id);
            return Ok(());
        };

        match job.status {
            JobStatus::Completed => {
                warn!("Job {} already COMPLETED, skipping duplicate dispatch", job.id);
                return Ok(());
            }
            JobStatus::Running => {
                // 행 잠금이 임계 구역을 직렬화하므로, 이 분기는 이전
                // 소유자가 RUNNING 상태로 크래시한 경우에만 발생합니다.
                warn!("Job {} already RUNNING, declining execution", job.id);
                return Ok(());
            }
            // FAILED는 재큐/재제출 경로, SUBMITTED/QUEUED는 정상 경로
            JobStatus::Failed | JobStatus::Submitted | JobStatus::Queued => {}
        }

        if job.attempt_count == 0 {
            info!("Job {} started", job.id);
        } else {
            info!("Job {} retry attempt {}", job.id, job.attempt_count);
        }

        job.status = JobStatus::Running;
        match JobRepository::save(&mut tx, &mut job).await {
            Ok(()) => {}
            Err(StoreError::StaleVersion) => {
                warn!("Job {} was handled by another worker, exiting", job.id);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        match self.perform_backtest(&job, started).await {
            Ok(result) => {
                ResultRepository::insert(&mut tx, &result).await?;

                job.status = JobStatus::Completed;
                match JobRepository::save(&mut tx, &mut job).await {
                    Ok(()) => {}
                    Err(StoreError::StaleVersion) => {
                        warn!("Job {} was handled by another worker, discarding result", job.id);
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                }

                tx.commit().await.map_err(StoreError::from)?;

                let execution_time_ms = started.elapsed().as_millis() as u64;
                info!(
                    "Job {} completed in {:.2}s",
                    job.id,
                    execution_time_ms as f64 / 1000.0
                );
                metrics::record_job_completed(execution_time_ms);

                if let Some(sweep_id) = job.parent_sweep_id {
                    self.notify_sweep(sweep_id).await;
                }

                Ok(())
            }
            Err(failure) => {
                // 본 트랜잭션을 롤백해 RUNNING 전이를 되돌린 뒤,
                // 독립 트랜잭션에서 실패를 기록합니다.
                drop(tx);
                error!("Job {} execution failed: {}", seed.id, failure.reason());
                self.handle_failure(seed.id, &failure).await
            }
        }
    }

    /// 계산 커널 호출: 시리즈 로드 → 전략 생성 → 백테스트 → 결과 변환.
    async fn perform_backtest(
        &self,
        job: &JobRecord,
        started: Instant,
    ) -> Result<NewResult, JobFailure> {
        info!(
            "Performing backtest - strategy: {}, symbol: {}, period: {} to {}",
            job.strategy_name, job.symbol, job.start_date, job.end_date
        );

        let series = self
            .gateway
            .load(&job.symbol, job.start_date, job.end_date)
            .await
            .map_err(|e| JobFailure::Transient(e.to_string()))?;

        if series.is_empty() {
            return Err(JobFailure::Precondition(
                "no market data available for the specified period".to_string(),
            ));
        }

        let parameters: Value = serde_json::from_str(&job.parameters_json)
            .unwrap_or_else(|_| Value::Object(Default::default()));
        let initial_capital = parse_initial_capital(&parameters);

        let mut strategy = StrategyRegistry::create(&job.strategy_name, &parameters)
            .map_err(|e| JobFailure::Precondition(e.to_string()))?;

        let config = EngineConfig { initial_capital };
        let report = BacktestEngine::run(strategy.as_mut(), &series, &config)
            .map_err(|e| JobFailure::Precondition(e.to_string()))?;

        let trades_json = serde_json::to_string(&report.trades)
            .map_err(|e| JobFailure::Transient(format!("trade log serialization: {}", e)))?;

        Ok(NewResult {
            job_id: job.id,
            total_return: report.total_return,
            cagr: report.cagr,
            volatility: report.volatility,
            sharpe_ratio: report.sharpe_ratio,
            sortino_ratio: report.sortino_ratio,
            max_drawdown: report.max_drawdown,
            win_rate: report.win_rate,
            execution_time_ms: started.elapsed().as_millis() as i64,
            trades_json,
        })
    }

    /// 실패 처리기. 항상 자체 트랜잭션에서 원자적으로 실행됩니다.
    ///
    /// 시도 횟수를 올리고, 한도 미만이면 QUEUED로 되돌려 재큐하며
    /// (큐 push 실패 시 FAILED로 강등), 한도에 도달하면 FAILED로
    /// 종결합니다.
    async fn handle_failure(
        &self,
        job_id: i64,
        failure: &JobFailure,
    ) -> Result<(), ExecuteError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let Some(mut job) = JobRepository::lock_for_update(&mut tx, job_id).await? else {
            error!("Cannot record failure: job {} not found", job_id);
            return Ok(());
        };

        job.attempt_count += 1;
        job.failure_reason = Some(truncate_reason(failure.reason()));

        if (job.attempt_count as u32) < self.retry.max_attempts {
            warn!(
                "Job {} failed (attempt {}/{}): {}. Requeuing for retry...",
                job.id,
                job.attempt_count,
                self.retry.max_attempts,
                failure.reason()
            );

            job.status = JobStatus::Queued;
            match JobRepository::save(&mut tx, &mut job).await {
                Ok(()) => {}
                Err(StoreError::StaleVersion) => {
                    warn!("Job {} was handled by another worker, skipping failure record", job.id);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            // 상태 기록과 원자적이어야 하므로 push는 실패 트랜잭션 안에서
            // 일어납니다. 전달이 불가능하면 재시도도 불가능하므로 FAILED로
            // 강등합니다.
            if let Err(queue_err) = self.queue.push(job.id).await {
                error!("Failed to requeue job {}: {}", job.id, queue_err);
                job.status = JobStatus::Failed;
                JobRepository::save(&mut tx, &mut job).await?;
                tx.commit().await.map_err(StoreError::from)?;

                metrics::record_job_failed();
                if let Some(sweep_id) = job.parent_sweep_id {
                    self.notify_sweep(sweep_id).await;
                }
                return Ok(());
            }

            tx.commit().await.map_err(StoreError::from)?;
            info!("Job {} requeued for retry attempt {}", job.id, job.attempt_count + 1);
            metrics::record_job_retried();
        } else {
            error!(
                "Job {} failed permanently after {} attempts: {}",
                job.id,
                job.attempt_count,
                failure.reason()
            );

            job.status = JobStatus::Failed;
            match JobRepository::save(&mut tx, &mut job).await {
                Ok(()) => {}
                Err(StoreError::StaleVersion) => {
                    warn!("Job {} was handled by another worker, skipping failure record", job.id);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
            tx.commit().await.map_err(StoreError::from)?;

            metrics::record_job_failed();
            if let Some(sweep_id) = job.parent_sweep_id {
                self.notify_sweep(sweep_id).await;
            }
        }

        Ok(())
    }

    /// 스윕 코디네이터에 자식 종결을 알립니다. 알림 실패는 잡 결과에
    /// 영향을 주지 않습니다 (재집계가 자가 치유).
    async fn notify_sweep(&self, sweep_id: i64) {
        if let Err(e) = self.sweeps.on_child_terminal(sweep_id).await {
            error!("Failed to update sweep {} progress: {}", sweep_id, e);
        }
    }
}

/// 파라미터 블롭에서 초기 자본을 읽습니다. 없거나 잘못되면 기본값.
fn parse_initial_capital(parameters: &Value) -> Decimal {
    let default = Decimal::from(DEFAULT_INITIAL_CAPITAL);

    let Some(raw) = parameters.get("initialCapital") else {
        return default;
    };

    let parsed = match raw {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    };

    match parsed {
        Some(capital) if capital > Decimal::ZERO => capital,
        Some(capital) => {
            warn!("Invalid initial capital {}, using default", capital);
            default
        }
        None => default,
    }
}

/// 실패 사유를 1000자로 자릅니다.
fn truncate_reason(reason: &str) -> String {
    if reason.chars().count() <= MAX_FAILURE_REASON_LEN {
        return reason.to_string();
    }
    let truncated: String = reason.chars().take(MAX_FAILURE_REASON_LEN - 3).collect();
    format!("{}...", truncated)
}
