use crate::errors::{Result, TelegramOutcome, TgVaultError};
use crate::telegram::next_backoff;
use std::future::Future;
use std::time::Duration;

/// Per-operation backoff tuning (Design Note §9 "Telegram error
/// classification"): a chunk upload is worth retrying hard since re-sending
/// it is cheap relative to losing the whole file, while a `getFile`
/// resolution during download backs off faster since the caller is a user
/// waiting on bytes.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const CHUNK_SEND: RetryPolicy = RetryPolicy {
        max_attempts: 6,
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(30),
    };

    pub const DOWNLOAD_RESOLVE: RetryPolicy = RetryPolicy {
        max_attempts: 4,
        base_delay: Duration::from_millis(250),
        max_delay: Duration::from_secs(10),
    };

    pub const TORRENT_CONTROL: RetryPolicy = RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(20),
    };
}

/// Drives a Telegram Bot API call to completion, sleeping through
/// `RetryAfter` responses and exponential backoff on transient failures,
/// giving up after `policy.max_attempts` (spec.md §4.9 "Retry and backoff").
pub async fn retry_telegram_call<T, F, Fut>(policy: RetryPolicy, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TelegramOutcome<T>>,
{
    let mut last_error = String::new();
    for attempt in 0..policy.max_attempts {
        match call().await {
            TelegramOutcome::Ok(value) => return Ok(value),
            TelegramOutcome::RetryAfter(after) => {
                tokio::time::sleep(after).await;
            }
            TelegramOutcome::Failed(err) => {
                last_error = err.to_string();
                if !is_transient(&err) {
                    return Err(err);
                }
                tokio::time::sleep(next_backoff(attempt, policy.base_delay, policy.max_delay)).await;
            }
        }
    }
    Err(TgVaultError::RetryExhausted {
        attempts: policy.max_attempts,
        last_error,
    })
}

fn is_transient(err: &TgVaultError) -> bool {
    matches!(
        err,
        TgVaultError::UpstreamUnavailable(_) | TgVaultError::TelegramError(_) | TgVaultError::IoError(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_once_the_call_returns_ok() {
        let attempts = AtomicU32::new(0);
        let result = retry_telegram_call(RetryPolicy::DOWNLOAD_RESOLVE, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    TelegramOutcome::Failed(TgVaultError::UpstreamUnavailable("down".into()))
                } else {
                    TelegramOutcome::Ok(42)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_do_not_retry() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = retry_telegram_call(RetryPolicy::DOWNLOAD_RESOLVE, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { TelegramOutcome::Failed(TgVaultError::BadInput("nope".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_attempts_surfaces_retry_exhausted() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let result: Result<()> = retry_telegram_call(policy, || async {
            TelegramOutcome::Failed(TgVaultError::UpstreamUnavailable("down".into()))
        })
        .await;
        assert!(matches!(result, Err(TgVaultError::RetryExhausted { attempts: 2, .. })));
    }
}
