//! 워커 풀 동작 테스트.
//!
//! 실제 Executor와 DB 없이 스텁 러너로 풀 역학을 검증합니다:
//! 큐 소비, 중복 전달 허용, 종결 잡 조기 탈락, 협력적 종료.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use quantbt_core::{JobStatus, RetryConfig, WorkerConfig};
use quantbt_orchestrator::{ExecuteError, JobPreview, JobRunner, JobSeed, WorkerPool};
use quantbt_queue::{JobQueue, MemoryJobQueue};

/// 실행된 잡 id를 기록하는 스텁 러너.
struct StubRunner {
    executed: Mutex<Vec<i64>>,
    /// 잡별 사전 조회 응답. 없으면 QUEUED/시도 0으로 간주.
    previews: Mutex<HashMap<i64, JobPreview>>,
}

impl StubRunner {
    fn new() -> Self {
        Self {
            executed: Mutex::new(Vec::new()),
            previews: Mutex::new(HashMap::new()),
        }
    }

    fn with_preview(self, job_id: i64, status: JobStatus, attempt_count: i32) -> Self {
        self.previews.lock().unwrap().insert(
            job_id,
            JobPreview {
                status,
                attempt_count,
            },
        );
        self
    }

    fn executed(&self) -> Vec<i64> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobRunner for StubRunner {
    async fn preview(&self, job_id: i64) -> Result<Option<JobPreview>, ExecuteError> {
        Ok(Some(
            self.previews
                .lock()
                .unwrap()
                .get(&job_id)
                .copied()
                .unwrap_or(JobPreview {
                    status: JobStatus::Queued,
                    attempt_count: 0,
                }),
        ))
    }

    async fn execute(&self, seed: JobSeed) -> Result<(), ExecuteError> {
        self.executed.lock().unwrap().push(seed.id);
        Ok(())
    }
}

fn test_worker_config(count: usize) -> WorkerConfig {
    WorkerConfig {
        count,
        enabled: true,
        poll_timeout_secs: 1,
        recovery_delay_secs: 0,
        shutdown_grace_secs: 5,
    }
}

fn no_backoff_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        backoff_secs: vec![0],
    }
}

async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn test_pool_drains_queue_each_job_once() {
    let queue: Arc<MemoryJobQueue> = Arc::new(MemoryJobQueue::new());
    let runner = Arc::new(StubRunner::new());

    for id in 1..=20 {
        queue.push(id).await.unwrap();
    }

    let pool = WorkerPool::start(
        queue.clone(),
        runner.clone(),
        &test_worker_config(3),
        no_backoff_retry(),
    );
    assert_eq!(pool.len(), 3);

    let drained = wait_until(
        || runner.executed().len() == 20,
        Duration::from_secs(5),
    )
    .await;
    assert!(drained, "expected all 20 jobs executed");

    pool.shutdown().await;

    let mut executed = runner.executed();
    executed.sort_unstable();
    assert_eq!(executed, (1..=20).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_terminal_job_delivery_is_dropped_before_execution() {
    let queue: Arc<MemoryJobQueue> = Arc::new(MemoryJobQueue::new());
    // 잡 7은 이미 COMPLETED, 잡 8은 RUNNING (다른 워커 소유로 간주)
    let runner = Arc::new(
        StubRunner::new()
            .with_preview(7, JobStatus::Completed, 0)
            .with_preview(8, JobStatus::Running, 0),
    );

    queue.push(7).await.unwrap();
    queue.push(8).await.unwrap();
    queue.push(9).await.unwrap();

    let pool = WorkerPool::start(
        queue.clone(),
        runner.clone(),
        &test_worker_config(2),
        no_backoff_retry(),
    );

    let done = wait_until(|| runner.executed() == vec![9], Duration::from_secs(5)).await;
    pool.shutdown().await;

    assert!(done, "only the QUEUED job should reach the executor");
}

#[tokio::test]
async fn test_failed_job_delivery_still_executes() {
    // FAILED 상태의 전달은 재큐 경로로 실행까지 진행됩니다.
    let queue: Arc<MemoryJobQueue> = Arc::new(MemoryJobQueue::new());
    let runner = Arc::new(StubRunner::new().with_preview(3, JobStatus::Failed, 1));

    queue.push(3).await.unwrap();

    let pool = WorkerPool::start(
        queue.clone(),
        runner.clone(),
        &test_worker_config(1),
        no_backoff_retry(),
    );

    let done = wait_until(|| runner.executed() == vec![3], Duration::from_secs(5)).await;
    pool.shutdown().await;

    assert!(done);
}

#[tokio::test]
async fn test_shutdown_stops_idle_workers() {
    let queue: Arc<MemoryJobQueue> = Arc::new(MemoryJobQueue::new());
    let runner = Arc::new(StubRunner::new());

    let pool = WorkerPool::start(
        queue.clone(),
        runner.clone(),
        &test_worker_config(2),
        no_backoff_retry(),
    );

    // 유휴 상태에서 종료가 유예 시간 안에 끝나야 합니다.
    let shutdown = tokio::time::timeout(Duration::from_secs(4), pool.shutdown()).await;
    assert!(shutdown.is_ok(), "shutdown should finish within grace period");
    assert!(runner.executed().is_empty());
}
