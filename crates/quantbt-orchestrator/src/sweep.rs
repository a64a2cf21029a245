//! 파라미터 스윕 코디네이터.
//!
//! 스윕 요청을 N개의 자식 잡으로 펼치고, 완료를 추적하며, 최적화 지표
//! 기준 최적 자식을 선택합니다.
//!
//! 진행 갱신은 알림마다 자식 상태를 다시 세므로 알림이 유실되어도 자가
//! 치유됩니다. 동시 자식 종결에 의한 카운터 유실은 스윕 행 잠금으로
//! 직렬화해 방지합니다.

use chrono::{NaiveDate, Utc};
use quantbt_core::JobStatus;
use quantbt_queue::{JobQueue, QueueError};
use quantbt_store::{
    JobRepository, NewJob, NewSweep, ResultRecord, ResultRepository, StoreError, SweepRecord,
    SweepRepository,
};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::idempotency;
use crate::metrics;

/// 스윕 에러.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// 한 전략의 파라미터 조합 그리드.
#[derive(Debug, Clone)]
pub struct StrategyGrid {
    pub strategy_name: String,
    pub parameter_combinations: Vec<Value>,
}

/// 검증이 끝난 스윕 요청.
#[derive(Debug, Clone)]
pub struct SweepRequest {
    pub name: String,
    pub description: Option<String>,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: Decimal,
    pub optimization_metric: String,
    pub strategies: Vec<StrategyGrid>,
}

/// 스윕 제출 결과.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub sweep_id: i64,
    pub status: JobStatus,
    pub message: String,
    pub total_jobs: i32,
    pub child_job_ids: Vec<i64>,
}

/// 최적 자식 잡 상세.
#[derive(Debug, Clone)]
pub struct BestChild {
    pub job_id: i64,
    pub strategy_name: String,
    pub parameters_json: String,
    pub result: ResultRecord,
    pub optimization_metric_value: Decimal,
}

/// 스윕 조회 결과.
#[derive(Debug, Clone)]
pub struct SweepStatus {
    pub sweep: SweepRecord,
    pub child_job_ids: Vec<i64>,
    pub best: Option<BestChild>,
}

/// 스윕 코디네이터.
pub struct SweepService {
    pool: PgPool,
    queue: Arc<dyn JobQueue>,
}

impl SweepService {
    pub fn new(pool: PgPool, queue: Arc<dyn JobQueue>) -> Self {
        Self { pool, queue }
    }

    /// 파라미터 스윕을 제출합니다.
    ///
    /// 부모 스윕 행을 만들고 (전략 × 파라미터 조합)마다 자식 잡을 생성해
    /// 큐에 넣습니다. 자식의 멱등성 키는 스윕 id를 포함하므로 스윕 간에
    /// 충돌하지 않습니다.
    pub async fn submit_sweep(&self, request: SweepRequest) -> Result<SweepOutcome, SweepError> {
        info!("Submitting parameter sweep: {}", request.name);

        let total_jobs: i32 = request
            .strategies
            .iter()
            .map(|grid| grid.parameter_combinations.len() as i32)
            .sum();

        let sweep = SweepRepository::create(
            &self.pool,
            &NewSweep {
                name: request.name.clone(),
                description: request.description.clone(),
                status: JobStatus::Queued,
                total_jobs,
                optimization_metric: request.optimization_metric.clone(),
            },
        )
        .await?;

        info!(
            "Created sweep job {} with {} total child jobs",
            sweep.id, total_jobs
        );

        let mut child_job_ids = Vec::with_capacity(total_jobs as usize);

        for grid in &request.strategies {
            for combination in &grid.parameter_combinations {
                // 초기 자본을 자식 파라미터에 병합
                let mut parameters = combination.clone();
                if let Value::Object(ref mut map) = parameters {
                    map.insert(
                        "initialCapital".to_string(),
                        Value::String(request.initial_capital.normalize().to_string()),
                    );
                }

                let idempotency_key = idempotency::sweep_child_key(
                    sweep.id,
                    &grid.strategy_name,
                    &request.symbol,
                    request.start_date,
                    request.end_date,
                    &parameters,
                );

                let new_job = NewJob {
                    strategy_name: grid.strategy_name.clone(),
                    symbol: request.symbol.clone(),
                    start_date: request.start_date,
                    end_date: request.end_date,
                    parameters_json: idempotency::canonical_json(&parameters),
                    status: JobStatus::Queued,
                    idempotency_key,
                    parent_sweep_id: Some(sweep.id),
                };

                match JobRepository::create(&self.pool, &new_job).await {
                    Ok(child) => {
                        if let Err(e) = self.queue.push(child.id).await {
                            // 실패한 자식은 카운터에 반영되지 않은 채 남고,
                            // 스윕은 completed+failed 재집계로 수렴합니다.
                            error!("Failed to queue child job {}: {}", child.id, e);
                        } else {
                            debug!("Created and queued child job {} for sweep {}", child.id, sweep.id);
                        }
                        child_job_ids.push(child.id);
                    }
                    Err(e) => {
                        error!("Failed to create child job for sweep {}: {}", sweep.id, e);
                    }
                }
            }
        }

        info!(
            "Sweep job {} submitted with {} child jobs queued",
            sweep.id,
            child_job_ids.len()
        );
        metrics::record_sweep_submitted(child_job_ids.len() as u64);

        Ok(SweepOutcome {
            sweep_id: sweep.id,
            status: sweep.status,
            message: "Parameter sweep submitted successfully".to_string(),
            total_jobs,
            child_job_ids,
        })
    }

    /// 자식 잡이 종결 상태(COMPLETED/FAILED)에 도달했을 때 호출됩니다.
    ///
    /// 스윕 행을 잠근 뒤 자식 상태를 다시 세어 카운터를 갱신하고, 모든
    /// 자식이 종결되었으면 스윕을 COMPLETED로 전이하며 최적 자식을
    /// 계산합니다.
    pub async fn on_child_terminal(&self, sweep_id: i64) -> Result<(), SweepError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let Some(mut sweep) = SweepRepository::lock_for_update(&mut tx, sweep_id).await? else {
            warn!("Sweep job {} not found", sweep_id);
            return Ok(());
        };

        let completed =
            JobRepository::count_children_by_status(&mut tx, sweep_id, JobStatus::Completed)
                .await?;
        let failed =
            JobRepository::count_children_by_status(&mut tx, sweep_id, JobStatus::Failed).await?;

        sweep.completed_jobs = completed as i32;
        sweep.failed_jobs = failed as i32;

        if completed + failed >= sweep.total_jobs as i64 {
            sweep.status = JobStatus::Completed;
            sweep.completed_at = Some(Utc::now());

            self.select_best_child(&mut sweep).await?;

            info!(
                "Sweep job {} completed. total: {}, completed: {}, failed: {}",
                sweep_id, sweep.total_jobs, completed, failed
            );
        } else {
            sweep.status = JobStatus::Running;
        }

        SweepRepository::save(&mut tx, &sweep).await?;
        tx.commit().await.map_err(StoreError::from)?;

        Ok(())
    }

    /// 완료된 자식 중 최적화 지표가 가장 큰 잡을 선택합니다.
    ///
    /// 결과는 단일 배치 조회로 읽습니다 (자식별 라운드트립 없음).
    /// 동점이면 id가 작은 자식이 이깁니다 (id 오름차순 순회 + 초과 비교).
    async fn select_best_child(&self, sweep: &mut SweepRecord) -> Result<(), SweepError> {
        let children = JobRepository::list_children(&self.pool, sweep.id).await?;
        let completed: Vec<_> = children
            .into_iter()
            .filter(|job| job.status == JobStatus::Completed)
            .collect();

        if completed.is_empty() {
            warn!("No completed jobs found for sweep {}", sweep.id);
            return Ok(());
        }

        let job_ids: Vec<i64> = completed.iter().map(|job| job.id).collect();
        let results = ResultRepository::find_by_job_ids(&self.pool, &job_ids).await?;

        // id 오름차순이므로 잡별 최신 결과가 마지막에 남습니다.
        let mut results_by_job: HashMap<i64, ResultRecord> = HashMap::new();
        for result in results {
            results_by_job.insert(result.job_id, result);
        }

        let mut best: Option<(i64, Decimal)> = None;
        for job in &completed {
            let Some(result) = results_by_job.get(&job.id) else {
                debug!("No result found for completed job {}", job.id);
                continue;
            };

            let value = metric_value(result, &sweep.optimization_metric);
            let improves = match best {
                Some((_, best_value)) => value > best_value,
                None => true,
            };
            if improves {
                best = Some((job.id, value));
            }
        }

        match best {
            Some((job_id, value)) => {
                sweep.best_job_id = Some(job_id);
                sweep.best_metric_value = Some(value);
                info!(
                    "Best job for sweep {} is job {} with {} = {}",
                    sweep.id, job_id, sweep.optimization_metric, value
                );
            }
            None => {
                warn!("Could not determine best job for sweep {}", sweep.id);
            }
        }

        Ok(())
    }

    /// 스윕 상태를 조회합니다.
    pub async fn sweep_status(&self, sweep_id: i64) -> Result<Option<SweepStatus>, SweepError> {
        let Some(sweep) = SweepRepository::find_by_id(&self.pool, sweep_id).await? else {
            return Ok(None);
        };

        let child_job_ids: Vec<i64> = JobRepository::list_children(&self.pool, sweep_id)
            .await?
            .iter()
            .map(|job| job.id)
            .collect();

        let best = match sweep.best_job_id {
            Some(best_job_id) => self.load_best_child(&sweep, best_job_id).await?,
            None => None,
        };

        Ok(Some(SweepStatus {
            sweep,
            child_job_ids,
            best,
        }))
    }

    async fn load_best_child(
        &self,
        sweep: &SweepRecord,
        best_job_id: i64,
    ) -> Result<Option<BestChild>, SweepError> {
        let Some(job) = JobRepository::find_by_id(&self.pool, best_job_id).await? else {
            return Ok(None);
        };
        let Some(result) = ResultRepository::find_latest_by_job_id(&self.pool, best_job_id).await?
        else {
            return Ok(None);
        };

        Ok(Some(BestChild {
            job_id: job.id,
            strategy_name: job.strategy_name,
            parameters_json: job.parameters_json,
            optimization_metric_value: sweep.best_metric_value.unwrap_or(Decimal::ZERO),
            result,
        }))
    }
}

/// 결과에서 최적화 지표 값을 읽습니다 (이름은 대소문자 무시).
///
/// `maxDrawdown`은 음수 백분율로 저장되므로 원값 비교가 곧 "얕은 낙폭
/// 우선"입니다 (0에 가까울수록 큼). 알 수 없는 이름은 샤프 비율로
/// 대체됩니다.
pub fn metric_value(result: &ResultRecord, metric_name: &str) -> Decimal {
    match metric_name.to_lowercase().as_str() {
        "totalreturn" => result.total_return,
        "sharperatio" => result.sharpe_ratio,
        "sortinoratio" => result.sortino_ratio,
        "cagr" => result.cagr,
        "winrate" => result.win_rate,
        "maxdrawdown" => result.max_drawdown,
        _ => result.sharpe_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn result(sharpe: Decimal, max_dd: Decimal) -> ResultRecord {
        ResultRecord {
            id: 1,
            job_id: 1,
            total_return: dec!(12.5),
            cagr: dec!(8.1),
            volatility: dec!(15.0),
            sharpe_ratio: sharpe,
            sortino_ratio: dec!(1.9),
            max_drawdown: max_dd,
            win_rate: dec!(0.6),
            execution_time_ms: 42,
            trades_json: "[]".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_metric_value_case_insensitive() {
        let r = result(dec!(1.5), dec!(-10));
        assert_eq!(metric_value(&r, "sharpeRatio"), dec!(1.5));
        assert_eq!(metric_value(&r, "SHARPERATIO"), dec!(1.5));
        assert_eq!(metric_value(&r, "totalReturn"), dec!(12.5));
        assert_eq!(metric_value(&r, "cagr"), dec!(8.1));
        assert_eq!(metric_value(&r, "winRate"), dec!(0.6));
    }

    #[test]
    fn test_metric_value_unknown_defaults_to_sharpe() {
        let r = result(dec!(2.2), dec!(-10));
        assert_eq!(metric_value(&r, "calmarRatio"), dec!(2.2));
    }

    #[test]
    fn test_max_drawdown_orientation() {
        // 낙폭은 음수로 저장됩니다. 얕은 낙폭(-5)이 깊은 낙폭(-20)보다
        // 커야 "최대가 승리" 선택에서 이깁니다.
        let shallow = metric_value(&result(dec!(1.0), dec!(-5)), "maxDrawdown");
        let deep = metric_value(&result(dec!(1.0), dec!(-20)), "maxDrawdown");
        assert!(shallow > deep);
    }
}
