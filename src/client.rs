//! The query client: owns the cache store and runs fetches against it.

use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{CacheStore, FetchTicket, Fetcher, KeyPattern, QueryKey, SharedFetch};
use crate::config::CacheConfig;
use crate::graph::{Entity, MutationKind};
use crate::mutation::{MutateFn, Mutation, MutationOptions};
use crate::notify::{NoopNotifier, Notifier};
use crate::query::{Query, QueryOptions};

/// Entry point for queries, mutations and invalidation.
///
/// Cheap to clone; clones share the same store and notifier.
#[derive(Clone)]
pub struct QueryClient {
  store: Arc<CacheStore>,
  notifier: Arc<dyn Notifier>,
}

impl Default for QueryClient {
  fn default() -> Self {
    Self::new(CacheStore::new(), Arc::new(NoopNotifier))
  }
}

impl QueryClient {
  pub fn new(store: CacheStore, notifier: Arc<dyn Notifier>) -> Self {
    Self {
      store: Arc::new(store),
      notifier,
    }
  }

  /// Build a client from configuration.
  pub fn from_config(config: &CacheConfig, notifier: Arc<dyn Notifier>) -> Self {
    let store = match config.stale_time() {
      Some(ttl) => CacheStore::new().with_stale_time(ttl),
      None => CacheStore::new(),
    };
    Self::new(store, notifier)
  }

  pub fn store(&self) -> &Arc<CacheStore> {
    &self.store
  }

  pub fn notifier(&self) -> &Arc<dyn Notifier> {
    &self.notifier
  }

  /// Subscribe to `key`, fetching it unless a fresh value is cached.
  pub fn use_query<T>(&self, key: QueryKey, fetcher: Fetcher, options: QueryOptions) -> Query<T>
  where
    T: DeserializeOwned,
  {
    Query::new(self.clone(), key, fetcher, options)
  }

  /// Build a mutation handle for `entity`/`kind`.
  pub fn use_mutation<V, R>(
    &self,
    entity: Entity,
    kind: MutationKind,
    mutate_fn: MutateFn<V>,
    options: MutationOptions<V, R>,
  ) -> Mutation<V, R>
  where
    R: DeserializeOwned,
  {
    Mutation::new(self.clone(), entity, kind, mutate_fn, options)
  }

  /// Fetch `key`, joining the in-flight request if there is one.
  ///
  /// The request is spawned so it completes even if every caller drops the
  /// returned future.
  pub fn fetch(&self, key: &QueryKey, fetcher: Fetcher) -> SharedFetch {
    let (shared, started) = self.store.begin_fetch(key, |ticket| {
      self.fetch_future(key.clone(), fetcher, ticket)
    });

    if started {
      debug!(key = %key, "fetch started");
      match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
          handle.spawn(shared.clone());
        }
        Err(_) => warn!(key = %key, "no async runtime, fetch runs only when awaited"),
      }
    } else {
      debug!(key = %key, "joined in-flight fetch");
    }
    shared
  }

  /// Fetch `key` only when the cached entry is missing or stale.
  pub fn ensure(&self, key: &QueryKey, fetcher: Fetcher) -> Option<SharedFetch> {
    if self.store.needs_fetch(key) {
      Some(self.fetch(key, fetcher))
    } else {
      None
    }
  }

  fn fetch_future(&self, key: QueryKey, fetcher: Fetcher, ticket: FetchTicket) -> SharedFetch {
    let client = self.clone();
    async move {
      let outcome = fetcher().await;
      if let Err(e) = &outcome {
        warn!(key = %key, error = %e, "fetch failed");
      }
      if let Some(again) = client.store.finish_fetch(&key, ticket, &outcome) {
        debug!(key = %key, "invalidated while in flight, refetching");
        client.fetch(&key, again);
      }
      outcome
    }
    .boxed()
    .shared()
  }

  /// Mark every entry matching `pattern` stale and refetch the subscribed
  /// ones. Returns the keys that were staled.
  pub fn invalidate(&self, pattern: &KeyPattern) -> Vec<QueryKey> {
    let invalidation = self.store.invalidate(pattern);
    for (key, fetcher) in invalidation.refetch {
      self.fetch(&key, fetcher);
    }
    invalidation.staled
  }

  /// Invalidate several patterns. All entries are staled before any refetch
  /// is scheduled.
  pub fn invalidate_all(&self, patterns: &[KeyPattern]) -> Vec<QueryKey> {
    let mut staled = Vec::new();
    let mut refetch = Vec::new();
    for pattern in patterns {
      let invalidation = self.store.invalidate(pattern);
      for key in invalidation.staled {
        if !staled.contains(&key) {
          staled.push(key);
        }
      }
      for (key, fetcher) in invalidation.refetch {
        if !refetch.iter().any(|(k, _): &(QueryKey, Fetcher)| k == &key) {
          refetch.push((key, fetcher));
        }
      }
    }
    for (key, fetcher) in refetch {
      self.fetch(&key, fetcher);
    }
    staled
  }

  /// Write a value directly into the cache.
  pub fn set_query_data(&self, key: &QueryKey, data: Value) {
    self.store.set(key, data);
  }

  /// Drop every cached entry. In-flight fetches land nowhere.
  pub fn clear(&self) {
    self.store.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::keys;
  use crate::testing::counting_fetcher;
  use serde_json::json;
  use std::time::Duration;

  #[tokio::test]
  async fn test_concurrent_fetches_share_one_request() {
    let client = QueryClient::default();
    let (fetcher, calls) = counting_fetcher(json!({"id": 42}), Duration::from_millis(20));
    let key = keys::student(42, 2024, 5);

    let a = client.fetch(&key, fetcher.clone());
    let b = client.fetch(&key, fetcher);
    let (ra, rb) = futures::join!(a, b);

    assert_eq!(ra.unwrap(), json!({"id": 42}));
    assert_eq!(rb.unwrap(), json!({"id": 42}));
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(client.store().get(&key).unwrap().data, Some(json!({"id": 42})));
  }

  #[tokio::test]
  async fn test_ensure_skips_fresh_entries() {
    let client = QueryClient::default();
    let key = keys::courses(3);
    client.set_query_data(&key, json!([]));

    let (fetcher, calls) = counting_fetcher(json!([1]), Duration::ZERO);
    assert!(client.ensure(&key, fetcher.clone()).is_none());

    client.invalidate(&KeyPattern::exact(&key));
    client.ensure(&key, fetcher).unwrap().await.unwrap();
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_fetch_completes_without_awaiting() {
    let client = QueryClient::default();
    let (fetcher, _) = counting_fetcher(json!("done"), Duration::from_millis(5));
    let key = keys::branches();

    drop(client.fetch(&key, fetcher));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.store().get(&key).unwrap().data, Some(json!("done")));
  }

  #[tokio::test]
  async fn test_invalidate_all_reports_each_key_once() {
    let client = QueryClient::default();
    client.set_query_data(&keys::financial_summary(3, 2024, 5), json!({}));
    let staled = client.invalidate_all(&[
      KeyPattern::all(crate::cache::Resource::FinancialSummary).param(3),
      KeyPattern::all(crate::cache::Resource::FinancialSummary),
    ]);
    assert_eq!(staled.len(), 1);
  }
}
