//! Process-wide cache of server responses, keyed by [`QueryKey`].

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

use super::key::{KeyPattern, QueryKey};
use crate::error::Result;

/// Future returned by a fetch function.
pub type FetchFuture = BoxFuture<'static, Result<Value>>;

/// Zero-argument fetch function bound to a key's parameters.
pub type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

/// An in-flight fetch every subscriber of a key can await.
pub type SharedFetch = Shared<FetchFuture>;

/// Snapshot of a cache entry as seen by readers.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
  pub key: QueryKey,
  /// Last successfully fetched value. Kept through errors and refetches.
  pub data: Option<Value>,
  /// No data yet and a fetch is running
  pub is_loading: bool,
  /// A fetch is running, with or without data
  pub is_fetching: bool,
  /// The last fetch failed
  pub is_error: bool,
  pub error: Option<String>,
  pub last_fetched_at: Option<DateTime<Utc>>,
  /// When the data stops being fresh on its own (None = until invalidated)
  pub stale_after: Option<DateTime<Utc>>,
  /// Explicitly invalidated since the last successful fetch
  pub is_invalidated: bool,
  pub subscribers: usize,
}

impl CacheEntry {
  /// Stale entries are refetched on the next subscription.
  pub fn is_stale(&self) -> bool {
    self.is_stale_at(Utc::now())
  }

  pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
    if self.is_invalidated || self.data.is_none() || self.is_error {
      return true;
    }
    self.stale_after.map(|at| now >= at).unwrap_or(false)
  }
}

/// Identifies one fetch attempt so its result can be checked against
/// invalidations and clears that happened while it was in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
  epoch: u64,
  generation: u64,
}

/// Result of a pattern invalidation.
#[derive(Default)]
pub struct Invalidation {
  /// Every key that was marked stale
  pub staled: Vec<QueryKey>,
  /// Keys with active subscribers, paired with the fetch function to rerun
  pub refetch: Vec<(QueryKey, Fetcher)>,
}

struct Record {
  data: Option<Value>,
  error: Option<String>,
  last_fetched_at: Option<DateTime<Utc>>,
  invalidated: bool,
  /// Bumped on every invalidation
  epoch: u64,
  in_flight: Option<SharedFetch>,
  /// Ordered by registration; the last one is the most recent fetch function.
  subscribers: Vec<(u64, Fetcher)>,
  tx: watch::Sender<CacheEntry>,
}

impl Record {
  fn new(key: &QueryKey) -> Self {
    let (tx, _rx) = watch::channel(CacheEntry {
      key: key.clone(),
      data: None,
      is_loading: false,
      is_fetching: false,
      is_error: false,
      error: None,
      last_fetched_at: None,
      stale_after: None,
      is_invalidated: false,
      subscribers: 0,
    });
    Self {
      data: None,
      error: None,
      last_fetched_at: None,
      invalidated: false,
      epoch: 0,
      in_flight: None,
      subscribers: Vec::new(),
      tx,
    }
  }

  fn snapshot(&self, key: &QueryKey, stale_time: Option<Duration>) -> CacheEntry {
    let is_fetching = self.in_flight.is_some();
    CacheEntry {
      key: key.clone(),
      data: self.data.clone(),
      is_loading: is_fetching && self.data.is_none(),
      is_fetching,
      is_error: self.error.is_some(),
      error: self.error.clone(),
      last_fetched_at: self.last_fetched_at,
      stale_after: self
        .last_fetched_at
        .zip(stale_time)
        .map(|(at, ttl)| at + ttl),
      is_invalidated: self.invalidated,
      subscribers: self.subscribers.len(),
    }
  }

  fn latest_fetcher(&self) -> Option<Fetcher> {
    self.subscribers.last().map(|(_, f)| Arc::clone(f))
  }
}

#[derive(Default)]
struct Inner {
  entries: HashMap<QueryKey, Record>,
  next_subscriber: u64,
  /// Bumped on clear so fetches started before a logout are discarded.
  generation: u64,
}

/// The shared cache. All reads and writes go through its methods; cached
/// values are never handed out by reference.
pub struct CacheStore {
  inner: Mutex<Inner>,
  stale_time: Option<Duration>,
}

impl Default for CacheStore {
  fn default() -> Self {
    Self::new()
  }
}

impl CacheStore {
  /// A store whose entries stay fresh until invalidated.
  pub fn new() -> Self {
    Self {
      inner: Mutex::new(Inner::default()),
      stale_time: None,
    }
  }

  /// Entries additionally go stale this long after their last fetch.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = Some(stale_time);
    self
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn publish(&self, key: &QueryKey, record: &Record) {
    record.tx.send_replace(record.snapshot(key, self.stale_time));
  }

  pub fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
    let inner = self.lock();
    inner
      .entries
      .get(key)
      .map(|r| r.snapshot(key, self.stale_time))
  }

  /// Store a freshly fetched value and clear any error or stale flag.
  pub fn set(&self, key: &QueryKey, data: Value) {
    let mut inner = self.lock();
    let record = inner
      .entries
      .entry(key.clone())
      .or_insert_with(|| Record::new(key));
    record.data = Some(data);
    record.error = None;
    record.invalidated = false;
    record.last_fetched_at = Some(Utc::now());
    self.publish(key, record);
  }

  /// Mark every entry matching `pattern` stale.
  ///
  /// Entries with subscribers are returned in `refetch` together with their
  /// most recent fetch function; entries without subscribers only get the
  /// flag flipped and wait for their next subscription.
  pub fn invalidate(&self, pattern: &KeyPattern) -> Invalidation {
    let mut inner = self.lock();
    let mut result = Invalidation::default();

    for (key, record) in inner.entries.iter_mut() {
      if !pattern.matches(key) {
        continue;
      }
      record.invalidated = true;
      record.epoch += 1;
      self.publish(key, record);
      result.staled.push(key.clone());

      if let Some(fetcher) = record.latest_fetcher() {
        result.refetch.push((key.clone(), fetcher));
      }
    }

    debug!(
      pattern = %pattern,
      staled = result.staled.len(),
      refetch = result.refetch.len(),
      "invalidated"
    );
    result
  }

  /// Register a subscriber. The entry is created if it does not exist yet.
  /// Dropping the returned guard unsubscribes.
  pub fn subscribe(self: &Arc<Self>, key: &QueryKey, fetcher: Fetcher) -> Subscription {
    let mut inner = self.lock();
    let id = inner.next_subscriber;
    inner.next_subscriber += 1;

    let record = inner
      .entries
      .entry(key.clone())
      .or_insert_with(|| Record::new(key));
    record.subscribers.push((id, fetcher));
    self.publish(key, record);
    let receiver = record.tx.subscribe();

    Subscription {
      store: Arc::clone(self),
      key: key.clone(),
      id,
      receiver,
    }
  }

  fn unsubscribe(&self, key: &QueryKey, id: u64) {
    let mut inner = self.lock();
    if let Some(record) = inner.entries.get_mut(key) {
      record.subscribers.retain(|(sid, _)| *sid != id);
      self.publish(key, record);
    }
  }

  /// Whether a subscription to `key` should trigger a fetch.
  pub fn needs_fetch(&self, key: &QueryKey) -> bool {
    let inner = self.lock();
    match inner.entries.get(key) {
      None => true,
      Some(record) => {
        record.in_flight.is_none() && record.snapshot(key, self.stale_time).is_stale()
      }
    }
  }

  /// Join the in-flight fetch for `key` or start one built by `start`.
  ///
  /// `start` runs under the store lock so two callers can never both begin a
  /// fetch for the same key. Returns the shared future and whether it is new.
  pub fn begin_fetch<F>(&self, key: &QueryKey, start: F) -> (SharedFetch, bool)
  where
    F: FnOnce(FetchTicket) -> SharedFetch,
  {
    let mut inner = self.lock();
    let generation = inner.generation;
    let record = inner
      .entries
      .entry(key.clone())
      .or_insert_with(|| Record::new(key));

    if let Some(in_flight) = &record.in_flight {
      return (in_flight.clone(), false);
    }

    let shared = start(FetchTicket {
      epoch: record.epoch,
      generation,
    });
    record.in_flight = Some(shared.clone());
    self.publish(key, record);
    (shared, true)
  }

  /// Apply the outcome of a fetch started with `ticket`.
  ///
  /// Returns a fetch function when the key was invalidated while the request
  /// was in flight and still has subscribers, so the caller can go again.
  pub fn finish_fetch(
    &self,
    key: &QueryKey,
    ticket: FetchTicket,
    outcome: &Result<Value>,
  ) -> Option<Fetcher> {
    let mut inner = self.lock();
    if inner.generation != ticket.generation {
      debug!(key = %key, "dropping fetch result from a cleared session");
      return None;
    }
    let record = inner.entries.get_mut(key)?;
    record.in_flight = None;

    let mut again = None;
    match outcome {
      Ok(data) => {
        record.data = Some(data.clone());
        record.error = None;
        record.last_fetched_at = Some(Utc::now());
        record.invalidated = record.epoch != ticket.epoch;
        if record.invalidated {
          again = record.latest_fetcher();
        }
      }
      Err(e) => {
        record.error = Some(e.user_message());
      }
    }
    self.publish(key, record);
    again
  }

  /// Drop every entry. Used on logout and when the session expires.
  pub fn clear(&self) {
    let mut inner = self.lock();
    inner.generation += 1;
    let dropped = inner.entries.len();
    inner.entries.clear();
    debug!(dropped, "cache cleared");
  }

  pub fn keys(&self) -> Vec<QueryKey> {
    self.lock().entries.keys().cloned().collect()
  }

  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Guard for an active subscription. Carries a receiver that observes every
/// change to the entry.
pub struct Subscription {
  store: Arc<CacheStore>,
  key: QueryKey,
  id: u64,
  receiver: watch::Receiver<CacheEntry>,
}

impl Subscription {
  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  pub fn receiver(&mut self) -> &mut watch::Receiver<CacheEntry> {
    &mut self.receiver
  }

  /// Whether the entry changed since it was last observed.
  pub fn has_changed(&self) -> bool {
    self.receiver.has_changed().unwrap_or(false)
  }

  /// Current snapshot of the entry.
  pub fn current(&self) -> CacheEntry {
    self.receiver.borrow().clone()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.store.unsubscribe(&self.key, self.id);
  }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("key", &self.key)
      .field("id", &self.id)
      .finish_non_exhaustive()
  }
}
