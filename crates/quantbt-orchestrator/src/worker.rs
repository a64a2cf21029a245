//! 백그라운드 워커 풀.
//!
//! 각 워커는 큐를 폴링해 잡 id를 받아 Executor에 넘기는 장수명 태스크
//! 입니다. 재시도 잡의 백오프 대기는 여기(잠금 없는 사전 단계)에서
//! 일어납니다. 행 잠금을 쥔 채 잠들지 않기 위해서입니다.
//!
//! 사전 단계의 상태 읽기는 잠금이 없습니다. 권위 있는 검사는 Executor가
//! 잠금 아래에서 수행하며, 여기서의 오래된 읽기는 백오프 수면 시간을
//! 늘리거나 줄일 뿐 정확성에 영향을 주지 않습니다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use quantbt_core::{JobStatus, RetryConfig, WorkerConfig};
use quantbt_queue::JobQueue;
use quantbt_store::JobRepository;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::executor::{ExecuteError, Executor, JobSeed};

/// 잠금 없는 사전 조회 결과.
#[derive(Debug, Clone, Copy)]
pub struct JobPreview {
    pub status: JobStatus,
    pub attempt_count: i32,
}

/// 워커가 잡을 넘기는 실행기 인터페이스.
///
/// 풀 역학(폴링 루프, 백오프, 종료)을 실제 Executor와 DB 없이 테스트할
/// 수 있도록 trait로 분리되어 있습니다.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// 백오프 판단용 잠금 없는 사전 조회. `None` = 잡 없음.
    async fn preview(&self, job_id: i64) -> Result<Option<JobPreview>, ExecuteError>;

    /// 잡 실행. 잡 레벨 실패는 내부에서 처리되며, 에러는 저장소 백엔드
    /// 장애 같은 워커 레벨 문제만 나타냅니다.
    async fn execute(&self, seed: JobSeed) -> Result<(), ExecuteError>;
}

#[async_trait]
impl JobRunner for Executor {
    async fn preview(&self, job_id: i64) -> Result<Option<JobPreview>, ExecuteError> {
        let job = JobRepository::find_by_id(self.pool(), job_id).await?;
        Ok(job.map(|job| JobPreview {
            status: job.status,
            attempt_count: job.attempt_count,
        }))
    }

    async fn execute(&self, seed: JobSeed) -> Result<(), ExecuteError> {
        Executor::execute(self, seed).await
    }
}

/// 단일 큐 소비자.
pub struct Worker {
    name: String,
    queue: Arc<dyn JobQueue>,
    runner: Arc<dyn JobRunner>,
    poll_timeout: Duration,
    recovery_delay: Duration,
    retry: RetryConfig,
    shutdown: CancellationToken,
}

impl Worker {
    /// 워커 루프를 실행합니다. 종료 신호를 받으면 진행 중인 잡을 마치고
    /// 반환합니다.
    pub async fn run(self) {
        info!("{} started and polling queue", self.name);

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let popped = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = self.queue.pop(self.poll_timeout) => result,
            };

            match popped {
                Ok(Some(job_id)) => {
                    info!("{} received job ID: {}", self.name, job_id);
                    self.process(job_id).await;
                }
                Ok(None) => continue,
                Err(e) => {
                    error!("{} queue error: {}. Recovering after delay", self.name, e);
                    tokio::time::sleep(self.recovery_delay).await;
                }
            }
        }

        info!("{} stopped", self.name);
    }

    /// 큐에서 받은 잡 하나를 처리합니다.
    async fn process(&self, job_id: i64) {
        // 잠금 없는 사전 읽기: 백오프 판단과 명백한 중복의 조기 탈락용
        let preview = match self.runner.preview(job_id).await {
            Ok(Some(preview)) => preview,
            Ok(None) => {
                warn!("{} - job {} not found, dropping", self.name, job_id);
                return;
            }
            Err(e) => {
                error!("{} - store error reading job {}: {}", self.name, job_id, e);
                tokio::time::sleep(self.recovery_delay).await;
                return;
            }
        };

        match preview.status {
            JobStatus::Completed => {
                warn!("{} - job {} already COMPLETED, skipping", self.name, job_id);
                return;
            }
            JobStatus::Running => {
                warn!(
                    "{} - job {} already RUNNING, another worker may own it",
                    self.name, job_id
                );
                return;
            }
            JobStatus::Failed => {
                info!("{} - job {} is FAILED, treating as requeue", self.name, job_id);
            }
            JobStatus::Submitted | JobStatus::Queued => {}
        }

        if preview.attempt_count > 0 {
            let delay = self.retry.backoff_delay(preview.attempt_count as u32);
            if !delay.is_zero() {
                info!(
                    "{} - job {} backoff {}ms before retry {}",
                    self.name,
                    job_id,
                    delay.as_millis(),
                    preview.attempt_count
                );
                tokio::time::sleep(delay).await;
            }
        }

        if let Err(e) = self.runner.execute(JobSeed { id: job_id }).await {
            // 저장소 백엔드 장애: 잡은 이전 상태 그대로 남고 워커는
            // 잠시 쉬었다가 재개합니다.
            error!("{} - failed to process job {}: {}", self.name, job_id, e);
            tokio::time::sleep(self.recovery_delay).await;
        }
    }
}

/// 고정 크기 워커 풀.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
    grace: Duration,
}

impl WorkerPool {
    /// 설정된 수의 워커를 시작합니다.
    pub fn start(
        queue: Arc<dyn JobQueue>,
        runner: Arc<dyn JobRunner>,
        config: &WorkerConfig,
        retry: RetryConfig,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let mut handles = Vec::with_capacity(config.count);

        info!("Starting {} backtest workers", config.count);

        for index in 0..config.count {
            let worker = Worker {
                name: format!("BacktestWorker-{}", index + 1),
                queue: Arc::clone(&queue),
                runner: Arc::clone(&runner),
                poll_timeout: Duration::from_secs(config.poll_timeout_secs),
                recovery_delay: Duration::from_secs(config.recovery_delay_secs),
                retry: retry.clone(),
                shutdown: shutdown.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        info!("All {} workers started", config.count);

        Self {
            handles,
            shutdown,
            grace: Duration::from_secs(config.shutdown_grace_secs),
        }
    }

    /// 현재 워커 수.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 모든 워커를 협력적으로 종료합니다.
    ///
    /// 진행 중인 잡이 끝나기를 유예 시간까지 기다린 뒤, 남은 워커는
    /// 강제 종료합니다.
    pub async fn shutdown(self) {
        info!("Stopping all workers...");
        self.shutdown.cancel();

        let deadline = Instant::now() + self.grace;
        for mut handle in self.handles {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Worker task join error: {}", e),
                Err(_) => {
                    warn!("Worker did not stop within grace period, aborting");
                    handle.abort();
                }
            }
        }

        info!("All workers stopped");
    }
}
