//! Process-wide online/offline signal.
//!
//! Nothing here polls the network. The flag moves only when a fetch settles:
//! a connectivity failure marks us offline, any success marks us online.
//! Every transition is queued for each listener, so a quick
//! offline-online-offline sequence still delivers its `Reconnected`.

use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

/// Transitions a slow listener may fall behind by before it skips ahead
const EVENT_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
  Online,
  Offline,
}

/// Connectivity transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
  /// A request succeeded after we had been offline
  Reconnected,
  /// A request failed because the remote could not be reached
  Disconnected,
}

impl From<Connectivity> for ConnectivityEvent {
  fn from(state: Connectivity) -> Self {
    match state {
      Connectivity::Online => ConnectivityEvent::Reconnected,
      Connectivity::Offline => ConnectivityEvent::Disconnected,
    }
  }
}

struct Channels {
  state: watch::Sender<Connectivity>,
  events: broadcast::Sender<ConnectivityEvent>,
}

#[derive(Clone)]
pub struct ConnectivityMonitor {
  channels: Arc<Channels>,
}

impl Default for ConnectivityMonitor {
  fn default() -> Self {
    Self::new()
  }
}

impl ConnectivityMonitor {
  /// Start optimistic: online until a request proves otherwise.
  pub fn new() -> Self {
    let (state, _) = watch::channel(Connectivity::Online);
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    Self {
      channels: Arc::new(Channels { state, events }),
    }
  }

  pub fn current(&self) -> Connectivity {
    *self.channels.state.borrow()
  }

  pub fn is_online(&self) -> bool {
    self.current() == Connectivity::Online
  }

  /// Record the outcome of a request. Only changes are broadcast.
  pub fn report(&self, state: Connectivity) {
    let events = &self.channels.events;
    self.channels.state.send_if_modified(|current| {
      if *current == state {
        return false;
      }
      info!("Connectivity changed: {:?} -> {:?}", current, state);
      *current = state;
      // Sent under the state lock so listeners see transitions in order.
      // No listeners is not an error.
      let _ = events.send(state.into());
      true
    });
  }

  /// Subscribe to future transitions.
  pub fn events(&self) -> ConnectivityEvents {
    ConnectivityEvents {
      rx: self.channels.events.subscribe(),
    }
  }
}

/// Queue of connectivity transitions for one listener.
pub struct ConnectivityEvents {
  rx: broadcast::Receiver<ConnectivityEvent>,
}

impl ConnectivityEvents {
  /// Receive the next transition. `None` once the monitor is gone.
  pub async fn next(&mut self) -> Option<ConnectivityEvent> {
    loop {
      match self.rx.recv().await {
        Ok(event) => return Some(event),
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
          debug!("Connectivity listener skipped {} transitions", skipped);
        }
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_transitions_are_broadcast() {
    let monitor = ConnectivityMonitor::new();
    let mut events = monitor.events();

    monitor.report(Connectivity::Offline);
    assert_eq!(events.next().await, Some(ConnectivityEvent::Disconnected));
    assert!(!monitor.is_online());

    monitor.report(Connectivity::Online);
    assert_eq!(events.next().await, Some(ConnectivityEvent::Reconnected));
  }

  #[tokio::test]
  async fn test_rapid_transitions_are_all_delivered() {
    let monitor = ConnectivityMonitor::new();
    let mut events = monitor.events();

    monitor.report(Connectivity::Offline);
    monitor.report(Connectivity::Online);
    monitor.report(Connectivity::Offline);

    assert_eq!(events.next().await, Some(ConnectivityEvent::Disconnected));
    assert_eq!(events.next().await, Some(ConnectivityEvent::Reconnected));
    assert_eq!(events.next().await, Some(ConnectivityEvent::Disconnected));
    assert_eq!(monitor.current(), Connectivity::Offline);
  }

  #[tokio::test]
  async fn test_lagging_listener_skips_to_recent_transitions() {
    let monitor = ConnectivityMonitor::new();
    let mut events = monitor.events();

    for _ in 0..EVENT_BUFFER {
      monitor.report(Connectivity::Offline);
      monitor.report(Connectivity::Online);
    }
    monitor.report(Connectivity::Offline);

    // The oldest transitions were dropped; the newest are still queued.
    let mut received = Vec::new();
    while let Ok(Some(event)) =
      tokio::time::timeout(std::time::Duration::from_millis(20), events.next()).await
    {
      received.push(event);
    }
    assert_eq!(received.len(), EVENT_BUFFER);
    assert_eq!(received.last(), Some(&ConnectivityEvent::Disconnected));
  }

  #[tokio::test]
  async fn test_repeated_state_is_not_an_event() {
    let monitor = ConnectivityMonitor::new();
    let mut events = monitor.events();

    monitor.report(Connectivity::Online);
    let pending =
      tokio::time::timeout(std::time::Duration::from_millis(20), events.next()).await;
    assert!(pending.is_err());
  }

  #[tokio::test]
  async fn test_events_end_when_monitor_dropped() {
    let monitor = ConnectivityMonitor::new();
    let mut events = monitor.events();
    drop(monitor);
    assert_eq!(events.next().await, None);
  }
}
