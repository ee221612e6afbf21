//! C4: the generic retry engine (`spec.md` §4.4).
//!
//! Reused directly by the group orchestrator (§4.9), whose "retry over the
//! whitelist with zero back-off" is exactly one call to [`execute_async`]
//! with a closure that indexes into a fixed replica list by
//! `ctx.attempt_count`.

use std::future::Future;
use std::time::Duration;

use groupcache_common::error::{Error, Result};

/// Per-call retry state visible to the closure passed to [`execute_async`].
#[derive(Debug, Default)]
pub struct RetryContext {
    pub attempt_count: usize,
    /// Set by the closure to abort retrying immediately, even if the error
    /// would otherwise be whitelisted and budget remains.
    pub is_exhausted: bool,
}

/// Runs `f` up to `max_attempts` times. Between attempts, `retryable` is
/// consulted: if it returns `false` for the error, or the attempt budget is
/// used up, the loop stops. A stop caused by budget exhaustion (or the
/// closure setting `ctx.is_exhausted`) wraps the last error in
/// [`Error::ExhaustedRetry`]; a stop caused by an error `retryable` rejects
/// is rethrown as-is.
pub async fn execute_async<F, Fut, T>(
    max_attempts: usize,
    back_off: Duration,
    retryable: impl Fn(&Error) -> bool,
    mut f: F,
) -> Result<T>
where
    F: FnMut(&mut RetryContext) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut ctx = RetryContext::default();
    loop {
        match f(&mut ctx).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let whitelisted = !ctx.is_exhausted && retryable(&err);
                let budget_remains = ctx.attempt_count + 1 < max_attempts;
                if whitelisted && budget_remains {
                    ctx.attempt_count += 1;
                    if !back_off.is_zero() {
                        tokio::time::sleep(back_off).await;
                    }
                    continue;
                }
                if whitelisted && !budget_remains {
                    return Err(Error::ExhaustedRetry {
                        attempts: ctx.attempt_count + 1,
                        source: Box::new(err),
                    });
                }
                if ctx.is_exhausted {
                    return Err(Error::ExhaustedRetry {
                        attempts: ctx.attempt_count + 1,
                        source: Box::new(err),
                    });
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupcache_common::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let calls = AtomicUsize::new(0);
        let result = execute_async(3, Duration::ZERO, |_| true, |_ctx| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Error>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_whitelisted_errors_until_budget_exhausted() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = execute_async(
            3,
            Duration::ZERO,
            |e| e.is_retryable_across_replicas(),
            |_ctx| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::ServerBusy) }
            },
        )
        .await;
        assert!(matches!(result, Err(Error::ExhaustedRetry { attempts: 3, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_whitelisted_error_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = execute_async(
            5,
            Duration::ZERO,
            |e| e.is_retryable_across_replicas(),
            |_ctx| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::ValidationFailed { key: "k".into(), reason: "bad".into() }) }
            },
        )
        .await;
        assert!(matches!(result, Err(Error::ValidationFailed { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn explicit_is_exhausted_aborts_early() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = execute_async(10, Duration::ZERO, |_| true, |ctx| {
            calls.fetch_add(1, Ordering::SeqCst);
            ctx.is_exhausted = true;
            async { Err(Error::InternalServerError("boom".into())) }
        })
        .await;
        assert!(matches!(result, Err(Error::ExhaustedRetry { attempts: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retryable_kinds_match_spec_whitelist() {
        assert!(ErrorKind::InternalServerError.is_retryable_across_replicas());
        assert!(ErrorKind::ServerBusy.is_retryable_across_replicas());
        assert!(ErrorKind::GroupNotFound.is_retryable_across_replicas());
        assert!(ErrorKind::ConnectFailure.is_retryable_across_replicas());
        assert!(ErrorKind::Timeout.is_retryable_across_replicas());
        assert!(!ErrorKind::ValidationFailed.is_retryable_across_replicas());
        assert!(!ErrorKind::BreakerOpen.is_retryable_across_replicas());
    }
}
