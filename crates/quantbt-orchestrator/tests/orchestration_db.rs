//! 오케스트레이션 end-to-end 테스트 (PostgreSQL 필요).
//!
//! `DATABASE_URL`이 가리키는 PostgreSQL에 대해 제출 → 큐 → 실행 → 종결
//! 전체 흐름을 검증합니다. 테이블을 비우고 시작하므로 반드시 전용 테스트
//! DB에서, 그리고 직렬로 실행하세요:
//!
//! ```text
//! DATABASE_URL=postgres://... cargo test -p quantbt-orchestrator -- --ignored --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use quantbt_core::{DataFallback, JobStatus, MarketDataConfig, RetryConfig};
use quantbt_data::MarketDataGateway;
use quantbt_orchestrator::{
    Executor, JobSeed, StrategyGrid, SubmissionService, SubmitRequest, SweepRequest, SweepService,
};
use quantbt_queue::{JobQueue, MemoryJobQueue};
use quantbt_store::{schema, JobRepository, ResultRepository};
use rust_decimal_macros::dec;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

struct Harness {
    pool: PgPool,
    queue: Arc<MemoryJobQueue>,
    submissions: SubmissionService,
    sweeps: Arc<SweepService>,
    executor: Arc<Executor>,
}

async fn harness(fallback: DataFallback) -> Harness {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for DB tests");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("connect to test database");

    schema::init(&pool).await.expect("init schema");
    sqlx::query("TRUNCATE backtest_results, backtest_jobs, parameter_sweeps RESTART IDENTITY")
        .execute(&pool)
        .await
        .expect("truncate tables");

    let queue = Arc::new(MemoryJobQueue::new());
    let queue_dyn: Arc<dyn JobQueue> = queue.clone();

    let gateway = Arc::new(MarketDataGateway::new(
        pool.clone(),
        &MarketDataConfig {
            cache_ttl_secs: 600,
            fallback,
        },
    ));

    let sweeps = Arc::new(SweepService::new(pool.clone(), queue_dyn.clone()));
    let executor = Arc::new(Executor::new(
        pool.clone(),
        queue_dyn.clone(),
        gateway,
        sweeps.clone(),
        RetryConfig {
            max_attempts: 3,
            backoff_secs: vec![0],
        },
    ));
    let submissions = SubmissionService::new(pool.clone(), queue_dyn);

    Harness {
        pool,
        queue,
        submissions,
        sweeps,
        executor,
    }
}

/// 큐가 비고 재큐도 멎을 때까지 잡을 순차 실행합니다.
async fn drain(harness: &Harness) {
    loop {
        match harness.queue.pop(Duration::from_millis(50)).await.unwrap() {
            Some(job_id) => {
                harness
                    .executor
                    .execute(JobSeed { id: job_id })
                    .await
                    .expect("executor store access");
            }
            None => break,
        }
    }
}

fn submit_request(symbol: &str) -> SubmitRequest {
    SubmitRequest {
        strategy_name: "BuyAndHold".to_string(),
        symbol: symbol.to_string(),
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        parameters: json!({}),
        initial_capital: dec!(10000),
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn test_happy_path_single_submission() {
    let harness = harness(DataFallback::Synthetic).await;

    let outcome = harness.submissions.submit(submit_request("AAPL")).await.unwrap();
    assert_eq!(outcome.status, JobStatus::Queued);
    assert!(!outcome.is_existing);

    drain(&harness).await;

    let job = JobRepository::find_by_id(&harness.pool, outcome.job_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    let results = ResultRepository::find_by_job_ids(&harness.pool, &[outcome.job_id])
        .await
        .unwrap();
    assert_eq!(results.len(), 1, "exactly one result row");
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn test_idempotent_concurrent_resubmission() {
    let harness = Arc::new(harness(DataFallback::Synthetic).await);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let harness = Arc::clone(&harness);
            tokio::spawn(async move { harness.submissions.submit(submit_request("MSFT")).await })
        })
        .collect();

    let mut job_ids = Vec::new();
    let mut existing_count = 0;
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        job_ids.push(outcome.job_id);
        if outcome.is_existing {
            existing_count += 1;
        }
    }

    job_ids.dedup();
    assert_eq!(job_ids.len(), 1, "all submitters observe the same job id");
    assert!(existing_count >= 7, "at most one submitter created the job");
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn test_deterministic_failure_drains_to_failed() {
    // 빈 시리즈 정책: 시장 데이터 로드가 항상 비어 있으므로 매 시도가
    // 결정적으로 실패합니다.
    let harness = harness(DataFallback::Empty).await;

    let outcome = harness.submissions.submit(submit_request("NODATA")).await.unwrap();
    drain(&harness).await;

    let job = JobRepository::find_by_id(&harness.pool, outcome.job_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempt_count, 3);
    assert!(job
        .failure_reason
        .as_deref()
        .unwrap_or_default()
        .contains("no market data"));

    let result_count = ResultRepository::count_by_job_id(&harness.pool, outcome.job_id)
        .await
        .unwrap();
    assert_eq!(result_count, 0);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn test_duplicate_dispatch_executes_once() {
    let harness = harness(DataFallback::Synthetic).await;

    let outcome = harness.submissions.submit(submit_request("GOOG")).await.unwrap();

    // 같은 id를 중복 전달
    harness.queue.push(outcome.job_id).await.unwrap();
    drain(&harness).await;

    let job = JobRepository::find_by_id(&harness.pool, outcome.job_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    let result_count = ResultRepository::count_by_job_id(&harness.pool, outcome.job_id)
        .await
        .unwrap();
    assert_eq!(result_count, 1, "loser dispatch must not write a second result");
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn test_sweep_selects_best_child() {
    let harness = harness(DataFallback::Synthetic).await;

    let request = SweepRequest {
        name: "ma-grid".to_string(),
        description: None,
        symbol: "AAPL".to_string(),
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        initial_capital: dec!(10000),
        optimization_metric: "sharpeRatio".to_string(),
        strategies: vec![StrategyGrid {
            strategy_name: "ma_crossover".to_string(),
            parameter_combinations: vec![
                json!({"shortPeriod": 5, "longPeriod": 20}),
                json!({"shortPeriod": 10, "longPeriod": 50}),
                json!({"shortPeriod": 20, "longPeriod": 60}),
                json!({"shortPeriod": 3, "longPeriod": 15}),
            ],
        }],
    };

    let outcome = harness.sweeps.submit_sweep(request).await.unwrap();
    assert_eq!(outcome.total_jobs, 4);
    assert_eq!(outcome.child_job_ids.len(), 4);

    drain(&harness).await;

    let status = harness
        .sweeps
        .sweep_status(outcome.sweep_id)
        .await
        .unwrap()
        .expect("sweep exists");
    let sweep = &status.sweep;

    assert_eq!(sweep.status, JobStatus::Completed);
    assert_eq!(sweep.completed_jobs + sweep.failed_jobs, 4);
    assert!(sweep.best_job_id.is_some());

    // 최적 자식의 지표 값이 실제로 자식들의 최댓값인지 확인
    let results = ResultRepository::find_by_job_ids(&harness.pool, &outcome.child_job_ids)
        .await
        .unwrap();
    let max_sharpe = results
        .iter()
        .map(|r| r.sharpe_ratio)
        .max()
        .expect("at least one result");
    assert_eq!(sweep.best_metric_value.unwrap(), max_sharpe);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn test_high_load_integrity() {
    let harness = Arc::new(harness(DataFallback::Synthetic).await);

    // 100개의 서로 다른 스펙을 동시 제출
    let tasks: Vec<_> = (0..100)
        .map(|i| {
            let harness = Arc::clone(&harness);
            tokio::spawn(async move {
                harness
                    .submissions
                    .submit(submit_request(&format!("SYM{i:03}")))
                    .await
            })
        })
        .collect();

    let mut job_ids = Vec::new();
    for task in tasks {
        job_ids.push(task.await.unwrap().unwrap().job_id);
    }
    job_ids.sort_unstable();
    job_ids.dedup();
    assert_eq!(job_ids.len(), 100, "no dedup key appears more than once");

    // 병렬 소비자 3개로 드레인
    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let harness = Arc::clone(&harness);
            tokio::spawn(async move { drain(&harness).await })
        })
        .collect();
    for consumer in consumers {
        consumer.await.unwrap();
    }

    let mut completed = 0;
    for &job_id in &job_ids {
        let job = JobRepository::find_by_id(&harness.pool, job_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        completed += ResultRepository::count_by_job_id(&harness.pool, job_id)
            .await
            .unwrap();
    }
    assert_eq!(completed, 100, "exactly one result row per job");
}
