use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::types::Result;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub timeout: Duration,
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(8_000),
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(4),
            jitter_ms: 200,
        }
    }
}

impl RetryConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            timeout: Duration::from_millis(read_env_u64(
                "SOL_RPC_TIMEOUT_MS",
                default.timeout.as_millis() as u64,
            )),
            max_retries: read_env_u64("SOL_RPC_MAX_RETRIES", default.max_retries as u64) as usize,
            base_delay: Duration::from_millis(read_env_u64(
                "SOL_RPC_BASE_DELAY_MS",
                default.base_delay.as_millis() as u64,
            )),
            max_delay: Duration::from_millis(read_env_u64(
                "SOL_RPC_MAX_DELAY_MS",
                default.max_delay.as_millis() as u64,
            )),
            jitter_ms: read_env_u64("SOL_RPC_JITTER_MS", default.jitter_ms),
        }
    }

    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(31) as u32).unwrap_or(u64::MAX);
        let backoff = Duration::from_millis(
            (self.base_delay.as_millis() as u64).saturating_mul(factor),
        );
        let capped = backoff.min(self.max_delay);
        if self.jitter_ms == 0 {
            capped
        } else {
            capped + Duration::from_millis(rand::thread_rng().gen_range(0..=self.jitter_ms))
        }
    }
}

fn read_env_u64(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(fallback)
}

/// Runs `action` until it succeeds, bounded by the config's per-attempt
/// timeout and retry budget.
pub async fn retry_with_timeout<T, F, Fut>(
    label: &'static str,
    config: &RetryConfig,
    mut action: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let attempts = config.max_retries.saturating_add(1);
    let mut last_err = None;
    for attempt in 0..attempts {
        match timeout(config.timeout, action()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => {
                warn!(attempt = attempt + 1, %err, "rpc error on {label}");
                last_err = Some(err);
            }
            Err(_) => {
                warn!(attempt = attempt + 1, "rpc timeout on {label}");
                last_err = Some(anyhow::anyhow!("rpc timeout for {label}").into());
            }
        }
        if attempt + 1 < attempts {
            sleep(config.delay_for_attempt(attempt)).await;
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("rpc retry exhausted for {label}").into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_config(max_retries: usize) -> RetryConfig {
        RetryConfig {
            timeout: Duration::from_millis(40),
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter_ms: 0,
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result = retry_with_timeout("test", &fast_config(2), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) + 1 < 3 {
                    Err(anyhow::anyhow!("transient").into())
                } else {
                    Ok(7u32)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn times_out_and_exhausts_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result = retry_with_timeout("slow", &fast_config(1), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(100)).await;
                Ok::<_, crate::types::SolWalletError>(())
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RetryConfig {
            timeout: Duration::from_millis(1),
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            jitter_ms: 0,
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(350));
    }
}
