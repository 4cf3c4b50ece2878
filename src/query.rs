//! Typed query handles over the shared cache.
//!
//! Inspired by TanStack Query, a `Query<T>` subscribes to one cache key,
//! triggers a fetch when the cached value is missing or stale, and exposes
//! loading/success/error state decoded into `T`.
//!
//! # Example
//!
//! ```ignore
//! let mut query: Query<Vec<Course>> = client.use_query(
//!     keys::courses(branch_id),
//!     fetcher,
//!     QueryOptions::default(),
//! );
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match query.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success { data, .. } => render_data(data),
//!     QueryState::Error { message, data } => render_error(message, data.as_ref()),
//!     QueryState::Idle => {}
//! }
//! ```

use serde::de::DeserializeOwned;

use crate::cache::{CacheEntry, Fetcher, QueryKey, Subscription};
use crate::client::QueryClient;

/// The state of a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
  /// Query is disabled and does no network activity
  Idle,
  /// No data yet; a fetch is running
  Loading,
  /// Data is present and the last fetch succeeded
  Success {
    data: T,
    /// A background refetch is running
    is_fetching: bool,
    /// The cached value was invalidated or aged out
    is_stale: bool,
  },
  /// The last fetch failed. Previously fetched data stays available.
  Error { message: String, data: Option<T> },
}

impl<T> QueryState<T> {
  pub fn is_idle(&self) -> bool {
    matches!(self, QueryState::Idle)
  }

  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success { .. })
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error { .. })
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success { data, .. } => Some(data),
      QueryState::Error { data, .. } => data.as_ref(),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error { message, .. } => Some(message),
      _ => None,
    }
  }
}

impl<T: DeserializeOwned> QueryState<T> {
  fn from_entry(entry: &CacheEntry) -> Self {
    let data = match entry.data.clone().map(serde_json::from_value::<T>) {
      None => None,
      Some(Ok(data)) => Some(data),
      Some(Err(e)) => {
        return QueryState::Error {
          message: format!("Failed to decode {}: {}", entry.key, e),
          data: None,
        }
      }
    };

    match (data, &entry.error) {
      (data, Some(message)) => QueryState::Error {
        message: message.clone(),
        data,
      },
      (Some(data), None) => QueryState::Success {
        data,
        is_fetching: entry.is_fetching,
        is_stale: entry.is_stale(),
      },
      (None, None) => QueryState::Loading,
    }
  }
}

/// Options accepted by [`QueryClient::use_query`].
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
  /// When false the query stays idle until enabled.
  pub enabled: bool,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self { enabled: true }
  }
}

impl QueryOptions {
  pub fn enabled(enabled: bool) -> Self {
    Self { enabled }
  }
}

/// A subscription to one cache key with typed state.
///
/// Dropping the query unsubscribes. A fetch already in flight still runs to
/// completion and updates the cache for other readers.
pub struct Query<T> {
  client: QueryClient,
  key: QueryKey,
  fetcher: Fetcher,
  subscription: Option<Subscription>,
  state: QueryState<T>,
}

impl<T: DeserializeOwned> Query<T> {
  pub(crate) fn new(
    client: QueryClient,
    key: QueryKey,
    fetcher: Fetcher,
    options: QueryOptions,
  ) -> Self {
    let mut query = Self {
      client,
      key,
      fetcher,
      subscription: None,
      state: QueryState::Idle,
    };
    if options.enabled {
      query.activate();
    }
    query
  }

  fn activate(&mut self) {
    let subscription = self
      .client
      .store()
      .subscribe(&self.key, self.fetcher.clone());
    self.subscription = Some(subscription);
    self.client.ensure(&self.key, self.fetcher.clone());
    self.sync();
  }

  fn sync(&mut self) {
    if let Some(subscription) = &mut self.subscription {
      let entry = subscription.receiver().borrow_and_update().clone();
      self.state = QueryState::from_entry(&entry);
    }
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Get the data, including data kept visible through an error.
  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_idle(&self) -> bool {
    self.state.is_idle()
  }

  /// Check if the query is currently loading.
  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Check if the query succeeded.
  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  /// Check if the query failed.
  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  /// Get the error message if the query failed.
  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Whether a fetch for this key is running.
  pub fn is_fetching(&self) -> bool {
    match &self.state {
      QueryState::Loading => true,
      QueryState::Success { is_fetching, .. } => *is_fetching,
      _ => self
        .subscription
        .as_ref()
        .map(|s| s.current().is_fetching)
        .unwrap_or(false),
    }
  }

  pub fn is_enabled(&self) -> bool {
    self.subscription.is_some()
  }

  /// Enable or disable the query. Enabling subscribes and fetches if needed;
  /// disabling unsubscribes and returns to idle.
  pub fn set_enabled(&mut self, enabled: bool) {
    match (enabled, self.subscription.is_some()) {
      (true, false) => self.activate(),
      (false, true) => {
        self.subscription = None;
        self.state = QueryState::Idle;
      }
      _ => {}
    }
  }

  /// Refetch now, sharing any request already in flight. No-op when disabled.
  pub fn refetch(&mut self) {
    if self.subscription.is_none() {
      return;
    }
    self.client.fetch(&self.key, self.fetcher.clone());
    self.sync();
  }

  /// Pick up cache changes without waiting.
  ///
  /// Returns `true` if the state changed. Call this in your event loop tick
  /// handler.
  pub fn poll(&mut self) -> bool {
    let changed = match &self.subscription {
      Some(subscription) => subscription.has_changed(),
      None => false,
    };
    if changed {
      self.sync();
    }
    changed
  }

  /// Wait for the next change to the cached entry.
  ///
  /// Returns `false` when the query is disabled or the cache was cleared.
  pub async fn changed(&mut self) -> bool {
    let Some(subscription) = &mut self.subscription else {
      return false;
    };
    if subscription.receiver().changed().await.is_err() {
      return false;
    }
    self.sync();
    true
  }

  /// Wait until the query has settled into success or error.
  pub async fn settled(&mut self) -> &QueryState<T> {
    self.poll();
    while self.is_fetching() {
      if !self.changed().await {
        break;
      }
    }
    &self.state
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key)
      .field("state", &self.state)
      .field("enabled", &self.subscription.is_some())
      .finish_non_exhaustive()
  }
}
