//! 잡 라이프사이클 상태.
//!
//! 단일 백테스트 잡과 파라미터 스윕이 공유하는 상태 집합입니다.
//! 상태 전이는 잡 저장소의 행 잠금 아래에서만 일어납니다.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 잡 라이프사이클 상태.
///
/// `COMPLETED`와 `FAILED`는 종결 상태이며, 재시도 로직이 `FAILED`에
/// 도달하기 전까지는 `QUEUED`로 되돌아갈 수 있습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// 제출됨 (아직 큐에 들어가지 않음)
    Submitted,
    /// 큐에서 대기 중
    Queued,
    /// 워커가 실행 중
    Running,
    /// 정상 완료
    Completed,
    /// 최종 실패
    Failed,
}

/// 알 수 없는 상태 문자열.
#[derive(Debug, Clone, Error)]
#[error("unknown job status: {0}")]
pub struct InvalidStatus(pub String);

impl JobStatus {
    /// DB 저장용 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// 종결 상태인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUBMITTED" => Ok(JobStatus::Submitted),
            "QUEUED" => Ok(JobStatus::Queued),
            "RUNNING" => Ok(JobStatus::Running),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_round_trip() {
        for status in [
            JobStatus::Submitted,
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn test_unknown_status() {
        assert!(JobStatus::from_str("PAUSED").is_err());
    }
}
