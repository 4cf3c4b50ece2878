//! Error taxonomy shared by the transport, the executors and the hooks.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by queries and mutations.
///
/// `Clone` because a single de-duplicated fetch hands its outcome to every
/// subscriber waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
  /// A required field is missing or malformed. Raised before any network call.
  #[error("{message}")]
  Validation {
    field: &'static str,
    message: String,
  },

  /// Network or HTTP failure. `message` is the server-supplied text when the
  /// response carried one, otherwise a generic description.
  #[error("{message}")]
  Transport {
    status: Option<u16>,
    message: String,
  },

  /// The access token expired and the single refresh attempt failed.
  #[error("Session expired, please sign in again")]
  AuthExpired,

  /// A payload could not be mapped onto the expected model.
  #[error("Failed to decode response: {0}")]
  Decode(String),
}

impl Error {
  pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
    Self::Validation {
      field,
      message: message.into(),
    }
  }

  pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
    Self::Transport {
      status,
      message: message.into(),
    }
  }

  /// Text shown to the user in an error notification.
  pub fn user_message(&self) -> String {
    self.to_string()
  }

  pub fn is_auth_expired(&self) -> bool {
    matches!(self, Self::AuthExpired)
  }
}

impl From<serde_json::Error> for Error {
  fn from(e: serde_json::Error) -> Self {
    Self::Decode(e.to_string())
  }
}

impl From<reqwest::Error> for Error {
  fn from(e: reqwest::Error) -> Self {
    let status = e.status().map(|s| s.as_u16());
    let message = if e.is_timeout() {
      "Request timed out".to_string()
    } else if e.is_connect() {
      "Could not reach the server".to_string()
    } else {
      format!("Request failed: {}", e)
    };
    Self::Transport { status, message }
  }
}
