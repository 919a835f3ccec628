//! Error taxonomy and connectivity classification.
//!
//! Failures are turned into an [`ArtError`] once, at the boundary where they
//! happen (HTTP response, transport, SQLite). Retry and offline decisions then
//! look at the variant, and only fall back to message text when the failure
//! carried no structured status.

use std::fmt;
use thiserror::Error;

/// Result alias for the domain layer.
pub type Result<T, E = ArtError> = std::result::Result<T, E>;

/// Lower-cased fragments that identify a connectivity failure.
const NETWORK_PATTERNS: &[&str] = &[
  "failed to fetch",
  "network error",
  "networkerror",
  "network request failed",
  "connection refused",
  "connection reset",
  "connection aborted",
  "offline",
  "unreachable",
  "timed out",
  "error sending request",
  "dns error",
  "err_internet_disconnected",
  "econnrefused",
  "econnreset",
  "enotfound",
  "etimedout",
  "enetunreach",
  "ehostunreach",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtError {
  /// Deterministic request failure (4xx). Never retried.
  #[error("{message}")]
  Client { status: Option<u16>, message: String },

  /// Connectivity failure or server-side error. Retried with backoff.
  #[error("{message}")]
  Transient {
    status: Option<u16>,
    /// Set when the request never got a response.
    network: bool,
    message: String,
  },

  /// Local persistence failure. Not retried.
  #[error("Storage error: {message}")]
  Storage { message: String },

  #[error("{message}")]
  Unknown { message: String },
}

impl ArtError {
  /// Classify a bare message with text heuristics.
  ///
  /// Used when the failure reached us without a status code.
  pub fn from_message(message: impl Into<String>) -> Self {
    let message = message.into();
    if is_network_message(&message) {
      return Self::Transient {
        status: None,
        network: true,
        message,
      };
    }
    match client_status_in(&message) {
      Some(status) => Self::Client {
        status: Some(status),
        message,
      },
      None => Self::Unknown { message },
    }
  }

  /// Classify an HTTP response status.
  pub fn from_status(status: u16, message: impl Into<String>) -> Self {
    let message = message.into();
    match status {
      400..=499 => Self::Client {
        status: Some(status),
        message,
      },
      500..=599 => Self::Transient {
        status: Some(status),
        network: false,
        message,
      },
      _ => Self::Unknown { message },
    }
  }

  /// A request that never got a response.
  pub fn network(message: impl Into<String>) -> Self {
    Self::Transient {
      status: None,
      network: true,
      message: message.into(),
    }
  }

  pub fn storage(message: impl Into<String>) -> Self {
    Self::Storage {
      message: message.into(),
    }
  }

  pub fn message(&self) -> &str {
    match self {
      Self::Client { message, .. }
      | Self::Transient { message, .. }
      | Self::Storage { message }
      | Self::Unknown { message } => message,
    }
  }

  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Client { status, .. } | Self::Transient { status, .. } => *status,
      _ => None,
    }
  }

  pub fn is_client_error(&self) -> bool {
    matches!(self, Self::Client { .. })
  }

  /// Whether this failure means the remote could not be reached.
  pub fn is_network(&self) -> bool {
    match self {
      Self::Transient { network: true, .. } => true,
      Self::Client { .. } | Self::Storage { .. } => false,
      Self::Transient { status: Some(_), .. } => false,
      other => is_network_message(other.message()),
    }
  }
}

impl From<rusqlite::Error> for ArtError {
  fn from(e: rusqlite::Error) -> Self {
    Self::storage(e.to_string())
  }
}

/// Decide whether an arbitrary error value describes a connectivity failure.
///
/// `None` stands for a missing error and is never a network error.
pub fn is_network_error<E>(error: Option<&E>) -> bool
where
  E: fmt::Display + ?Sized,
{
  error
    .map(|e| is_network_message(&e.to_string()))
    .unwrap_or(false)
}

/// Cached content always wins over the offline view; only a first load that
/// failed for connectivity reasons falls back.
pub fn should_show_offline_fallback(error: Option<&ArtError>, has_data: bool) -> bool {
  if has_data {
    return false;
  }
  error.map(ArtError::is_network).unwrap_or(false)
}

fn is_network_message(text: &str) -> bool {
  let text = text.to_lowercase();
  NETWORK_PATTERNS.iter().any(|p| text.contains(p))
}

/// Find a standalone three-digit 4xx token ("404", "HTTP 401 Unauthorized").
fn client_status_in(text: &str) -> Option<u16> {
  text
    .split(|c: char| !c.is_ascii_digit())
    .filter(|token| token.len() == 3 && token.starts_with('4'))
    .find_map(|token| token.parse::<u16>().ok())
}
