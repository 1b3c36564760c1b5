// ==========================================
// 仓储作业核心 - 存储重试策略
// ==========================================
// 职责: 所有存储读写统一的有界重试（线性退避）
// 约束: 只重试瞬时错误；约束违反、业务冲突直接返回
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use std::time::Duration;

/// 默认最大尝试次数
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// 默认退避基数（毫秒），第 n 次失败后等待 n * base
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

/// 有界重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// 不等待的重试策略（测试用）
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// 第 `attempt` 次（从 1 开始）失败后的等待时间
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// 执行操作，瞬时错误按策略重试
    ///
    /// # 返回
    /// - Ok(T): 某次尝试成功
    /// - Err(StoreUnavailable): 瞬时错误且重试耗尽
    /// - Err(其他): 非瞬时错误，原样返回
    pub fn run<T, F>(&self, operation: &str, mut op: F) -> RepositoryResult<T>
    where
        F: FnMut() -> RepositoryResult<T>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op() {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "存储操作重试后成功");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => {
                    if attempt >= max_attempts {
                        tracing::error!(
                            operation,
                            attempts = attempt,
                            error = %err,
                            "存储操作重试耗尽"
                        );
                        return Err(RepositoryError::StoreUnavailable {
                            operation: operation.to_string(),
                            attempts: attempt,
                            last_error: err.to_string(),
                        });
                    }

                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "存储操作失败，准备重试"
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
    }

    #[test]
    fn test_transient_error_retried_until_success() {
        let policy = RetryPolicy::immediate(3);
        let mut calls = 0;

        let result = policy.run("test.op", || {
            calls += 1;
            if calls < 3 {
                Err(RepositoryError::DatabaseBusy("database is locked".to_string()))
            } else {
                Ok(42)
            }
        });

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_exhausted_retries_become_store_unavailable() {
        let policy = RetryPolicy::immediate(3);
        let mut calls = 0;

        let result: RepositoryResult<()> = policy.run("test.op", || {
            calls += 1;
            Err(RepositoryError::DatabaseBusy("database is locked".to_string()))
        });

        assert_eq!(calls, 3);
        match result {
            Err(RepositoryError::StoreUnavailable { operation, attempts, .. }) => {
                assert_eq!(operation, "test.op");
                assert_eq!(attempts, 3);
            }
            other => panic!("Expected StoreUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_constraint_violation_not_retried() {
        let policy = RetryPolicy::immediate(3);
        let mut calls = 0;

        let result: RepositoryResult<()> = policy.run("test.op", || {
            calls += 1;
            Err(RepositoryError::UniqueConstraintViolation("UNIQUE".to_string()))
        });

        assert_eq!(calls, 1);
        assert!(matches!(result, Err(RepositoryError::UniqueConstraintViolation(_))));
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy { max_attempts: 0, base_delay: Duration::ZERO };
        let mut calls = 0;
        let _ = policy.run("test.op", || -> RepositoryResult<()> {
            calls += 1;
            Err(RepositoryError::DatabaseBusy("busy".to_string()))
        });
        assert_eq!(calls, 1);
    }
}
