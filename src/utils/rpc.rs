use std::future::Future;
use tokio::time::{sleep, timeout, Duration};

const RPC_CALL_TIMEOUT_MS: u64 = 1_500;
const RPC_READ_RETRIES: usize = 3;
const RPC_BACKOFF_BASE_MS: u64 = 100;
const RPC_BACKOFF_CAP_MS: u64 = 1_800;
const RPC_ERR_MAX_LEN: usize = 260;
const MAX_BACKOFF_DOUBLINGS: usize = 8;

/// Attempt limits for a single chain read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub call_timeout_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: RPC_READ_RETRIES,
            call_timeout_ms: RPC_CALL_TIMEOUT_MS,
            backoff_base_ms: RPC_BACKOFF_BASE_MS,
            backoff_cap_ms: RPC_BACKOFF_CAP_MS,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): `base * 2^attempt`, capped.
    pub fn backoff_ms(&self, attempt: usize) -> u64 {
        if self.backoff_base_ms == 0 {
            return 0;
        }
        let doublings = attempt.min(MAX_BACKOFF_DOUBLINGS) as u32;
        self.backoff_base_ms
            .saturating_mul(1u64 << doublings)
            .min(self.ceiling_ms())
    }

    fn ceiling_ms(&self) -> u64 {
        self.backoff_cap_ms.max(self.backoff_base_ms)
    }
}

/// How a failed chain read should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcFailure {
    /// Asking again cannot help (reverts, malformed requests, unsupported methods).
    Fatal,
    /// Provider quota hit; wait the full backoff ceiling.
    RateLimited,
    /// Dropped sockets, missing blocks on a lagging node, timeouts.
    Transient,
}

impl RpcFailure {
    pub fn classify(message: &str) -> Self {
        let msg = message.to_ascii_lowercase();
        const FATAL: [&str; 7] = [
            "revert",
            "method not found",
            "-32601",
            "invalid params",
            "-32602",
            "parse error",
            "-32700",
        ];
        const QUOTA: [&str; 4] = [
            "429",
            "rate limit",
            "too many requests",
            "compute units per second",
        ];

        if FATAL.iter().any(|needle| msg.contains(needle)) {
            RpcFailure::Fatal
        } else if QUOTA.iter().any(|needle| msg.contains(needle)) {
            RpcFailure::RateLimited
        } else {
            RpcFailure::Transient
        }
    }
}

pub fn compact_rpc_error_message(message: &str) -> String {
    crate::utils::error::compact_error_message(message, RPC_ERR_MAX_LEN)
}

/// Run `op` until it succeeds, fails fatally, or the policy runs out of attempts.
///
/// Every attempt is bounded by `call_timeout_ms`; attempts are separated by
/// [`RetryPolicy::backoff_ms`], or by the backoff ceiling after a rate-limit response.
pub async fn run_with_retry<T, Op, Fut>(
    policy: &RetryPolicy,
    context: &str,
    mut op: Op,
) -> anyhow::Result<T>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let max_attempts = policy.attempts.max(1);
    let mut last_failure = String::new();

    for attempt in 1..=max_attempts {
        let mut delay_ms = policy.backoff_ms(attempt);
        match timeout(Duration::from_millis(policy.call_timeout_ms), op()).await {
            Ok(Ok(value)) => {
                if attempt > 1 {
                    tracing::debug!("[RPC] {} recovered on attempt {}", context, attempt);
                }
                return Ok(value);
            }
            Ok(Err(err)) => {
                let message = compact_rpc_error_message(&format!("{err:#}"));
                match RpcFailure::classify(&message) {
                    RpcFailure::Fatal => {
                        return Err(anyhow::anyhow!(
                            "{context} failed on attempt {attempt}/{max_attempts}: {message}"
                        ));
                    }
                    RpcFailure::RateLimited => delay_ms = policy.ceiling_ms(),
                    RpcFailure::Transient => {}
                }
                last_failure = message;
            }
            Err(_) => {
                last_failure = format!("timed out after {}ms", policy.call_timeout_ms);
            }
        }

        if attempt < max_attempts {
            tracing::debug!(
                "[RPC] {} attempt {}/{} failed: {}; retrying in {}ms",
                context,
                attempt,
                max_attempts,
                last_failure,
                delay_ms
            );
            sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    Err(anyhow::anyhow!(
        "{context} failed after {max_attempts} attempt(s): {last_failure}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(attempts: usize) -> RetryPolicy {
        RetryPolicy {
            attempts,
            call_timeout_ms: 200,
            backoff_base_ms: 1,
            backoff_cap_ms: 4,
        }
    }

    #[test]
    fn test_failure_classes() {
        assert_eq!(
            RpcFailure::classify("server returned an error response: execution reverted"),
            RpcFailure::Fatal
        );
        assert_eq!(RpcFailure::classify("-32601 method not found"), RpcFailure::Fatal);
        assert_eq!(
            RpcFailure::classify("HTTP error 429: exceeded compute units per second capacity"),
            RpcFailure::RateLimited
        );
        assert_eq!(RpcFailure::classify("Too many requests"), RpcFailure::RateLimited);
        assert_eq!(
            RpcFailure::classify("block #19000000 not found yet"),
            RpcFailure::Transient
        );
        assert_eq!(RpcFailure::classify("connection reset by peer"), RpcFailure::Transient);
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_ms(1), 200);
        assert_eq!(policy.backoff_ms(2), 400);
        assert_eq!(policy.backoff_ms(10), 1_800);
        assert_eq!(policy.backoff_ms(usize::MAX), 1_800);

        let no_wait = RetryPolicy {
            backoff_base_ms: 0,
            ..policy
        };
        assert_eq!(no_wait.backoff_ms(3), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_run_with_retry_recovers_from_transient_failures() {
        let calls = AtomicUsize::new(0);
        let value = run_with_retry(&fast_policy(3), "eth_getLogs", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(anyhow::anyhow!("connection reset"))
                } else {
                    Ok(7u64)
                }
            }
        })
        .await
        .expect("third attempt succeeds");
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_run_with_retry_stops_on_revert() {
        let calls = AtomicUsize::new(0);
        let err = run_with_retry(&fast_policy(5), "eth_call", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(anyhow::anyhow!("execution reverted")) }
        })
        .await
        .expect_err("revert is terminal");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(err.to_string().contains("attempt 1/5"), "unexpected: {err}");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_run_with_retry_times_out_slow_calls() {
        let policy = RetryPolicy {
            call_timeout_ms: 20,
            ..fast_policy(2)
        };
        let err = run_with_retry(&policy, "eth_getBlockByNumber", || async {
            sleep(Duration::from_millis(500)).await;
            Ok::<u64, anyhow::Error>(1)
        })
        .await
        .expect_err("every attempt stalls");
        let message = err.to_string();
        assert!(message.contains("after 2 attempt(s)"), "unexpected: {message}");
        assert!(message.contains("timed out after 20ms"), "unexpected: {message}");
    }
}
