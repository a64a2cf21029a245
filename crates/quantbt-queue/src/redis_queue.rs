//! Redis 리스트 기반 잡 큐.
//!
//! RPUSH / BLPOP을 사용하는 FIFO 큐입니다. Redis 리스트 연산은 원자적이므로
//! 여러 워커가 경쟁해도 하나의 push를 두 소비자가 보는 일은 없습니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{QueueError, QueueResult};
use crate::JobQueue;

/// Redis 연결 기반 잡 큐.
#[derive(Clone)]
pub struct RedisJobQueue {
    connection: Arc<RwLock<MultiplexedConnection>>,
    queue_key: String,
}

impl RedisJobQueue {
    /// Redis에 연결하고 큐를 생성합니다.
    pub async fn connect(url: &str, queue_key: impl Into<String>) -> QueueResult<Self> {
        info!("Connecting to Redis job queue...");

        let client = Client::open(url).map_err(QueueError::from)?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::from)?;

        info!("Redis job queue connection established");

        Ok(Self {
            connection: Arc::new(RwLock::new(connection)),
            queue_key: queue_key.into(),
        })
    }

    /// Redis 상태를 확인합니다.
    pub async fn health_check(&self) -> QueueResult<bool> {
        let mut conn = self.connection.write().await;
        let result: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(QueueError::from)?;

        Ok(result == "PONG")
    }

    /// 현재 큐 길이.
    pub async fn len(&self) -> QueueResult<usize> {
        let mut conn = self.connection.write().await;
        let length: usize = conn.llen(&self.queue_key).await.map_err(QueueError::from)?;
        Ok(length)
    }

    /// 큐가 비어 있는지 확인합니다.
    pub async fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len().await? == 0)
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn push(&self, job_id: i64) -> QueueResult<()> {
        let mut conn = self.connection.write().await;
        let queue_size: i64 = conn
            .rpush(&self.queue_key, job_id)
            .await
            .map_err(QueueError::from)?;

        debug!(
            "Pushed job {} to queue {} (size: {})",
            job_id, self.queue_key, queue_size
        );

        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> QueueResult<Option<i64>> {
        let mut conn = self.connection.write().await;
        // BLPOP은 원자적이므로 여러 워커가 안전하게 경쟁할 수 있음
        let value: Option<(String, i64)> = conn
            .blpop(&self.queue_key, timeout.as_secs_f64())
            .await
            .map_err(QueueError::from)?;

        match value {
            Some((_, job_id)) => {
                debug!("Popped job {} from queue {}", job_id, self.queue_key);
                Ok(Some(job_id))
            }
            // 타임아웃 - 대기 중인 잡 없음
            None => Ok(None),
        }
    }
}
