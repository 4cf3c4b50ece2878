//! Notification bridge between mutations and whatever UI renders them.

use std::fmt;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Lifecycle stage of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
  Pending,
  Success,
  Error,
}

impl NotificationKind {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, NotificationKind::Pending)
  }
}

impl fmt::Display for NotificationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      NotificationKind::Pending => "pending",
      NotificationKind::Success => "success",
      NotificationKind::Error => "error",
    };
    f.write_str(s)
  }
}

/// One status message. Messages sharing a `message_id` replace each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub kind: NotificationKind,
  pub message_id: String,
  pub text: String,
}

/// Sink for mutation lifecycle messages.
pub trait Notifier: Send + Sync {
  fn notify(&self, notification: Notification);
}

/// Discards everything.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
  fn notify(&self, _notification: Notification) {}
}

/// Writes notifications to the log.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
  fn notify(&self, n: Notification) {
    match n.kind {
      NotificationKind::Error => warn!(id = %n.message_id, "{}", n.text),
      _ => info!(id = %n.message_id, kind = %n.kind, "{}", n.text),
    }
  }
}

/// Forwards notifications over an unbounded channel to a UI task.
pub struct ChannelNotifier {
  tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
  /// Create a notifier and the receiving end the UI drains.
  pub fn new() -> (Self, NotificationReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, NotificationReceiver { rx })
  }
}

impl Notifier for ChannelNotifier {
  fn notify(&self, notification: Notification) {
    // The UI may already be gone during teardown
    let _ = self.tx.send(notification);
  }
}

/// Receiving half of a [`ChannelNotifier`].
pub struct NotificationReceiver {
  rx: mpsc::UnboundedReceiver<Notification>,
}

impl NotificationReceiver {
  /// Receive the next notification
  pub async fn next(&mut self) -> Option<Notification> {
    self.rx.recv().await
  }

  /// Drain whatever has arrived without waiting.
  pub fn drain(&mut self) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = self.rx.try_recv() {
      out.push(n);
    }
    out
  }
}

/// Keeps the single active message per `message_id`, in first-shown order.
///
/// A UI can render `active()` directly: a pending message is replaced in
/// place by its success or error message instead of stacking.
#[derive(Default)]
pub struct StatusBoard {
  active: Mutex<Vec<Notification>>,
}

impl StatusBoard {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn active(&self) -> Vec<Notification> {
    self
      .active
      .lock()
      .map(|a| a.clone())
      .unwrap_or_default()
  }

  pub fn get(&self, message_id: &str) -> Option<Notification> {
    self
      .active()
      .into_iter()
      .find(|n| n.message_id == message_id)
  }

  /// Remove a message once the UI has finished showing it.
  pub fn dismiss(&self, message_id: &str) {
    if let Ok(mut active) = self.active.lock() {
      active.retain(|n| n.message_id != message_id);
    }
  }
}

impl Notifier for StatusBoard {
  fn notify(&self, notification: Notification) {
    let Ok(mut active) = self.active.lock() else {
      return;
    };
    match active
      .iter_mut()
      .find(|n| n.message_id == notification.message_id)
    {
      Some(existing) => *existing = notification,
      None => active.push(notification),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn note(kind: NotificationKind, id: &str, text: &str) -> Notification {
    Notification {
      kind,
      message_id: id.to_string(),
      text: text.to_string(),
    }
  }

  #[test]
  fn test_status_board_replaces_same_id() {
    let board = StatusBoard::new();
    board.notify(note(NotificationKind::Pending, "course:create", "Saving..."));
    board.notify(note(NotificationKind::Success, "course:create", "Saved"));

    let active = board.active();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].kind, NotificationKind::Success);
    assert_eq!(active[0].text, "Saved");
  }

  #[test]
  fn test_status_board_keeps_distinct_ids() {
    let board = StatusBoard::new();
    board.notify(note(NotificationKind::Pending, "a", "1"));
    board.notify(note(NotificationKind::Pending, "b", "2"));
    assert_eq!(board.active().len(), 2);

    board.dismiss("a");
    assert!(board.get("a").is_none());
    assert!(board.get("b").is_some());
  }

  #[tokio::test]
  async fn test_channel_notifier() {
    let (notifier, mut rx) = ChannelNotifier::new();
    notifier.notify(note(NotificationKind::Error, "x", "failed"));

    let n = rx.next().await.unwrap();
    assert_eq!(n.kind, NotificationKind::Error);
    assert!(n.kind.is_terminal());
    assert!(rx.drain().is_empty());
  }
}
