//! Freshness, eviction and retry rules for the query cache.
//!
//! The policy is plain configuration: the cache engine asks it how long data
//! stays fresh, when unused entries may go, and whether (and when) a failed
//! fetch is attempted again.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ArtError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPolicy {
  /// How long fetched data is served without refetching.
  pub stale_time: Duration,
  /// How long an entry with no subscribers survives before eviction.
  pub gc_time: Duration,
  /// Off by default: switching back to the app must not trigger a refetch storm.
  pub refetch_on_window_focus: bool,
  pub refetch_on_reconnect: bool,
  /// Additional attempts after the first one.
  pub max_retries: u32,
  pub base_delay: Duration,
  pub max_delay: Duration,
}

impl Default for QueryPolicy {
  fn default() -> Self {
    Self {
      stale_time: Duration::from_secs(5 * 60),
      gc_time: Duration::from_secs(10 * 60),
      refetch_on_window_focus: false,
      refetch_on_reconnect: true,
      max_retries: 2,
      base_delay: Duration::from_millis(1000),
      max_delay: Duration::from_millis(30_000),
    }
  }
}

impl QueryPolicy {
  /// Whether a request that failed on attempt `attempt` (0-based) is tried again.
  ///
  /// Client errors are deterministic and never retried. Local storage
  /// failures are not expected to clear up on their own either.
  pub fn should_retry(&self, attempt: u32, error: &ArtError) -> bool {
    if error.is_client_error() || matches!(error, ArtError::Storage { .. }) {
      return false;
    }
    attempt < self.max_retries
  }

  /// Exponential backoff: `base * 2^attempt`, capped at `max_delay`.
  pub fn retry_delay(&self, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    self.base_delay.saturating_mul(factor).min(self.max_delay)
  }
}

/// Bookkeeping for one in-flight request. Dropped when the request settles.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
  /// Failed attempts so far.
  pub attempt: u32,
  pub last_error: Option<ArtError>,
  pub total_delay: Duration,
}

/// Run `operation` until it succeeds or the policy refuses another attempt.
pub async fn retry_with_policy<F, Fut, T>(
  policy: &QueryPolicy,
  mut operation: F,
) -> (Result<T>, RetryState)
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T>>,
{
  let mut state = RetryState::default();

  loop {
    match operation().await {
      Ok(value) => {
        if state.attempt > 0 {
          debug!("Request succeeded after {} attempts", state.attempt + 1);
        }
        return (Ok(value), state);
      }
      Err(e) => {
        if !policy.should_retry(state.attempt, &e) {
          if e.is_client_error() || matches!(e, ArtError::Storage { .. }) {
            debug!("Error is not retryable: {}", e);
          } else {
            warn!(
              "All {} attempts exhausted. Last error: {}",
              state.attempt + 1,
              e
            );
          }
          state.last_error = Some(e.clone());
          return (Err(e), state);
        }

        let delay = policy.retry_delay(state.attempt);
        warn!(
          "Attempt {}/{} failed: {}. Retrying in {:?}",
          state.attempt + 1,
          policy.max_retries + 1,
          e,
          delay
        );
        state.last_error = Some(e);
        state.total_delay += delay;
        state.attempt += 1;

        tokio::time::sleep(delay).await;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  #[test]
  fn test_default_windows() {
    let policy = QueryPolicy::default();
    assert_eq!(policy.stale_time, Duration::from_secs(300));
    assert_eq!(policy.gc_time, Duration::from_secs(600));
    assert!(!policy.refetch_on_window_focus);
    assert!(policy.refetch_on_reconnect);
  }

  #[test]
  fn test_retry_predicate() {
    let policy = QueryPolicy::default();
    let not_found = ArtError::from_message("404");
    let network = ArtError::from_message("Network error");

    assert!(!policy.should_retry(0, &not_found));
    assert!(policy.should_retry(0, &network));
    assert!(policy.should_retry(1, &network));
    assert!(!policy.should_retry(2, &network));
  }

  #[test]
  fn test_server_errors_are_retried() {
    let policy = QueryPolicy::default();
    assert!(policy.should_retry(0, &ArtError::from_status(503, "unavailable")));
    assert!(!policy.should_retry(0, &ArtError::from_status(422, "bad filter")));
    assert!(!policy.should_retry(0, &ArtError::storage("database is locked")));
  }

  #[test]
  fn test_retry_delay() {
    let policy = QueryPolicy::default();
    assert_eq!(policy.retry_delay(0), Duration::from_millis(1000));
    assert_eq!(policy.retry_delay(1), Duration::from_millis(2000));
    assert_eq!(policy.retry_delay(2), Duration::from_millis(4000));
    assert_eq!(policy.retry_delay(10), Duration::from_millis(30_000));
    assert_eq!(policy.retry_delay(64), Duration::from_millis(30_000));
  }

  #[tokio::test(start_paused = true)]
  async fn test_retry_succeeds_after_failures() {
    let policy = QueryPolicy::default();
    let counter = Arc::new(AtomicU32::new(0));

    let (result, state) = retry_with_policy(&policy, || {
      let counter = counter.clone();
      async move {
        if counter.fetch_add(1, Ordering::SeqCst) < 2 {
          Err(ArtError::network("connection refused"))
        } else {
          Ok(7)
        }
      }
    })
    .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(state.attempt, 2);
    assert_eq!(state.total_delay, Duration::from_millis(3000));
  }

  #[tokio::test(start_paused = true)]
  async fn test_retry_budget_exhausted() {
    let policy = QueryPolicy::default();
    let counter = Arc::new(AtomicU32::new(0));

    let (result, state) = retry_with_policy(&policy, || {
      counter.fetch_add(1, Ordering::SeqCst);
      async { Err::<(), _>(ArtError::network("offline")) }
    })
    .await;

    assert!(result.is_err());
    assert_eq!(counter.load(Ordering::SeqCst), 3);
    assert_eq!(state.last_error, Some(ArtError::network("offline")));
  }

  #[tokio::test]
  async fn test_client_error_not_retried() {
    let policy = QueryPolicy::default();
    let counter = Arc::new(AtomicU32::new(0));

    let (result, _) = retry_with_policy(&policy, || {
      counter.fetch_add(1, Ordering::SeqCst);
      async { Err::<(), _>(ArtError::from_status(404, "GET /artworks/1: 404 Not Found")) }
    })
    .await;

    assert!(result.unwrap_err().is_client_error());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }
}
