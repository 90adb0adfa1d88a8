//! Retry policy for remote calls.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// How often and how patiently a failed call is repeated.
///
/// Only errors reporting [`is_retryable`](crate::error::AppError::is_retryable)
/// are repeated; everything else is returned on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// One extra attempt, no pause.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Never retry.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    pub async fn run<T, F, Fut>(&self, context: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    log::warn!(
                        "{} failed ({}), retry {}/{}",
                        context,
                        err,
                        attempt,
                        self.max_retries
                    );
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_transport_once() {
        let calls = &AtomicU32::new(0);
        let result = RetryPolicy::once()
            .run("page 1", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AppError::transport("http://api", "reset"))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = RetryPolicy::once()
            .run("page 1", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::transport("http://api", "timeout"))
            })
            .await;

        assert!(matches!(result, Err(AppError::Transport { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = RetryPolicy::new(3, Duration::ZERO)
            .run("page 1", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Upstream {
                    status: 500,
                    url: "http://api".into(),
                })
            })
            .await;

        assert!(matches!(result, Err(AppError::Upstream { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_none_policy() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = RetryPolicy::none()
            .run("probe", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::transport("http://api", "reset"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
