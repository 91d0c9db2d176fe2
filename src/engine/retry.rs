use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::LimitsConfig;
use crate::db::DatabaseError;

use super::EngineError;

/// Timeout and bounded-retry budget for store writes. A hung or failing
/// write never blocks a session indefinitely; it fails the initiating
/// operation after the budget is spent.
#[derive(Debug, Clone)]
pub(crate) struct WritePolicy {
    pub timeout: Duration,
    pub attempts: u32,
    pub backoff: Duration,
}

impl WritePolicy {
    pub fn from_limits(limits: &LimitsConfig) -> Self {
        Self {
            timeout: Duration::from_millis(limits.write_timeout_ms),
            attempts: limits.write_retries.max(1),
            backoff: Duration::from_millis(limits.retry_backoff_ms),
        }
    }
}

/// Runs `attempt` up to the policy's budget, with linear backoff between
/// attempts. Each attempt runs under the policy timeout.
pub(crate) async fn write_with_retry<T, F, Fut>(
    policy: &WritePolicy,
    operation: &'static str,
    mut attempt: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DatabaseError>>,
{
    let mut last = String::new();

    for round in 1..=policy.attempts {
        match tokio::time::timeout(policy.timeout, attempt()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => {
                warn!(operation, attempt = round, error = %err, "store write failed");
                last = err.to_string();
            }
            Err(_) => {
                warn!(operation, attempt = round, timeout = ?policy.timeout, "store write timed out");
                last = format!("timed out after {:?}", policy.timeout);
            }
        }

        if round < policy.attempts {
            tokio::time::sleep(policy.backoff * round).await;
        }
    }

    Err(EngineError::WriteExhausted {
        operation,
        attempts: policy.attempts,
        last,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::{WritePolicy, write_with_retry};
    use crate::db::DatabaseError;
    use crate::engine::EngineError;

    fn tight_policy(attempts: u32) -> WritePolicy {
        WritePolicy {
            timeout: Duration::from_millis(100),
            attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn returns_first_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();

        let result = write_with_retry(&tight_policy(3), "test_write", move || {
            let calls = calls_in_op.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(DatabaseError::Query("locked".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.expect("second attempt succeeds"), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausts_budget_on_persistent_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();

        let result: Result<(), _> = write_with_retry(&tight_policy(3), "test_write", move || {
            let calls = calls_in_op.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DatabaseError::Query("disk full".to_string()))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(EngineError::WriteExhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 3);
                assert!(last.contains("disk full"));
            }
            other => panic!("expected WriteExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn hung_write_counts_as_a_failed_attempt() {
        let result: Result<(), _> = write_with_retry(&tight_policy(2), "test_write", || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        })
        .await;

        match result {
            Err(EngineError::WriteExhausted { last, .. }) => {
                assert!(last.contains("timed out"));
            }
            other => panic!("expected WriteExhausted, got {other:?}"),
        }
    }
}
