//! 인메모리 잡 큐.
//!
//! Redis 없는 배포와 테스트에서 사용합니다. 단일 프로세스 내에서만
//! 동작하지만 [`JobQueue`] 계약(원자적 pop, 블로킹 타임아웃)은 동일하게
//! 지킵니다.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::QueueResult;
use crate::JobQueue;

/// 프로세스 내 FIFO 잡 큐.
#[derive(Default)]
pub struct MemoryJobQueue {
    items: Mutex<VecDeque<i64>>,
    notify: Notify,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 현재 큐 길이.
    pub fn len(&self) -> usize {
        self.items.lock().expect("queue mutex poisoned").len()
    }

    /// 큐가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn try_pop(&self) -> Option<i64> {
        self.items.lock().expect("queue mutex poisoned").pop_front()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn push(&self, job_id: i64) -> QueueResult<()> {
        self.items
            .lock()
            .expect("queue mutex poisoned")
            .push_back(job_id);
        self.notify.notify_one();
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> QueueResult<Option<i64>> {
        let deadline = Instant::now() + timeout;

        loop {
            // 알림 등록을 pop 시도보다 먼저 해야 push와의 경쟁에서
            // 깨어남을 놓치지 않습니다.
            let notified = self.notify.notified();

            if let Some(job_id) = self.try_pop() {
                return Ok(Some(job_id));
            }

            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return Ok(self.try_pop());
            };

            if tokio::time::timeout(remaining, notified).await.is_err() {
                return Ok(self.try_pop());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = MemoryJobQueue::new();
        queue.push(1).await.unwrap();
        queue.push(2).await.unwrap();
        queue.push(3).await.unwrap();

        assert_eq!(queue.pop(Duration::from_millis(10)).await.unwrap(), Some(1));
        assert_eq!(queue.pop(Duration::from_millis(10)).await.unwrap(), Some(2));
        assert_eq!(queue.pop(Duration::from_millis(10)).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_pop_times_out_when_empty() {
        let queue = MemoryJobQueue::new();
        let result = queue.pop(Duration::from_millis(20)).await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_pop_wakes_on_push() {
        let queue = Arc::new(MemoryJobQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop(Duration::from_secs(5)).await.unwrap() })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push(42).await.unwrap();

        assert_eq!(consumer.await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn test_concurrent_consumers_never_share_a_push() {
        let queue = Arc::new(MemoryJobQueue::new());
        for id in 0..100 {
            queue.push(id).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(id) = queue.pop(Duration::from_millis(20)).await.unwrap() {
                    seen.push(id);
                }
                seen
            }));
        }

        let mut all: Vec<i64> = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }

        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<i64>>());
    }
}
