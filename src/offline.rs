//! Offline fallback state for a screen that shows remote data.
//!
//! The controller never polls. It changes state on fetch outcomes and
//! user actions, and tells the caller what to do next.

use tracing::debug;

use crate::error::{should_show_offline_fallback, ArtError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackState {
  #[default]
  Content,
  Offline,
}

/// What the caller should do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackAction {
  None,
  /// Refetch through the normal policy.
  Refetch,
  /// Refetch once, skipping the backoff delay.
  RefetchNow,
  /// Leave the current screen for the home listing.
  NavigateHome,
}

#[derive(Debug, Default)]
pub struct OfflineFallback {
  state: FallbackState,
}

impl OfflineFallback {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn state(&self) -> FallbackState {
    self.state
  }

  pub fn is_offline(&self) -> bool {
    self.state == FallbackState::Offline
  }

  /// Show the fallback only for a network failure with nothing to display.
  pub fn on_fetch_error(&mut self, error: &ArtError, has_data: bool) {
    if should_show_offline_fallback(Some(error), has_data) {
      self.transition(FallbackState::Offline);
    }
  }

  pub fn on_fetch_success(&mut self) {
    self.transition(FallbackState::Content);
  }

  pub fn on_reconnect(&mut self) -> FallbackAction {
    match self.state {
      FallbackState::Offline => FallbackAction::Refetch,
      FallbackState::Content => FallbackAction::None,
    }
  }

  pub fn retry_now(&mut self) -> FallbackAction {
    FallbackAction::RefetchNow
  }

  /// Cached data is left alone.
  pub fn navigate_home(&mut self) -> FallbackAction {
    FallbackAction::NavigateHome
  }

  fn transition(&mut self, next: FallbackState) {
    if self.state != next {
      debug!("Offline fallback {:?} -> {:?}", self.state, next);
      self.state = next;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_network_error_without_data_goes_offline() {
    let mut fallback = OfflineFallback::new();
    fallback.on_fetch_error(&ArtError::network("Failed to fetch"), false);
    assert!(fallback.is_offline());

    fallback.on_fetch_success();
    assert_eq!(fallback.state(), FallbackState::Content);
  }

  #[test]
  fn test_cached_data_keeps_content() {
    let mut fallback = OfflineFallback::new();
    fallback.on_fetch_error(&ArtError::network("Failed to fetch"), true);
    assert!(!fallback.is_offline());
  }

  #[test]
  fn test_non_network_error_keeps_content() {
    let mut fallback = OfflineFallback::new();
    fallback.on_fetch_error(&ArtError::from_status(404, "not found"), false);
    fallback.on_fetch_error(&ArtError::from_status(500, "server error"), false);
    assert!(!fallback.is_offline());
  }

  #[test]
  fn test_reconnect_refetches_only_when_offline() {
    let mut fallback = OfflineFallback::new();
    assert_eq!(fallback.on_reconnect(), FallbackAction::None);

    fallback.on_fetch_error(&ArtError::from_message("Network error"), false);
    assert_eq!(fallback.on_reconnect(), FallbackAction::Refetch);
  }

  #[test]
  fn test_user_actions() {
    let mut fallback = OfflineFallback::new();
    fallback.on_fetch_error(&ArtError::network("offline"), false);

    assert_eq!(fallback.retry_now(), FallbackAction::RefetchNow);
    assert_eq!(fallback.navigate_home(), FallbackAction::NavigateHome);
    assert!(fallback.is_offline());
  }
}
