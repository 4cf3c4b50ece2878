//! The console session: active branch, transport and query client.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::info;

use crate::api::{get_fetcher, HttpTransport, Transport};
use crate::cache::{FetchFuture, Id, Param, QueryKey};
use crate::client::QueryClient;
use crate::config::Config;
use crate::graph::{Entity, InvalidationContext, MutationKind};
use crate::mutation::{Mutation, MutationOptions};
use crate::notify::Notifier;
use crate::query::{Query, QueryOptions};
use crate::storage::{SessionStorage, BRANCH_ID, SESSION_KEYS};

struct Inner {
  client: QueryClient,
  transport: Arc<dyn Transport>,
  storage: Arc<dyn SessionStorage>,
}

/// Handle passed to every hook. Cheap to clone.
#[derive(Clone)]
pub struct Session {
  inner: Arc<Inner>,
}

impl Session {
  pub fn new(
    client: QueryClient,
    transport: Arc<dyn Transport>,
    storage: Arc<dyn SessionStorage>,
  ) -> Self {
    Self {
      inner: Arc::new(Inner {
        client,
        transport,
        storage,
      }),
    }
  }

  /// Wire an HTTP session whose cache is torn down when the login expires.
  pub fn connect(
    config: &Config,
    storage: Arc<dyn SessionStorage>,
    notifier: Arc<dyn Notifier>,
  ) -> color_eyre::Result<Self> {
    let client = QueryClient::from_config(&config.cache, notifier);

    let (teardown_client, teardown_storage) = (client.clone(), storage.clone());
    let transport = HttpTransport::new(&config.api, storage.clone())?
      .on_auth_expired(move || teardown(&teardown_client, teardown_storage.as_ref()));

    Ok(Self::new(client, Arc::new(transport), storage))
  }

  pub fn client(&self) -> &QueryClient {
    &self.inner.client
  }

  pub fn transport(&self) -> &Arc<dyn Transport> {
    &self.inner.transport
  }

  pub fn storage(&self) -> &Arc<dyn SessionStorage> {
    &self.inner.storage
  }

  /// The selected branch, if any.
  pub fn branch_id(&self) -> Option<Id> {
    self
      .inner
      .storage
      .get(BRANCH_ID)
      .filter(|b| !b.trim().is_empty())
      .map(Id::from)
  }

  pub fn branch_param(&self) -> Option<Param> {
    self.branch_id().map(Param::from)
  }

  pub fn set_branch(&self, branch_id: Option<&Id>) {
    match branch_id {
      Some(id) => self.inner.storage.set(BRANCH_ID, &id.to_string()),
      None => self.inner.storage.remove(BRANCH_ID),
    }
  }

  /// Drop every cached entry and the stored credentials.
  pub fn logout(&self) {
    info!("logout");
    teardown(&self.inner.client, self.inner.storage.as_ref());
  }

  /// Subscribe to a GET endpoint under `key`.
  pub fn query<T: DeserializeOwned>(&self, key: QueryKey, path: String, enabled: bool) -> Query<T> {
    let fetcher = get_fetcher(self.inner.transport.clone(), path);
    self
      .inner
      .client
      .use_query(key, fetcher, QueryOptions::enabled(enabled))
  }

  /// Build a mutation that runs `call` against this session. The selected
  /// branch is read each time the mutation runs, both by `call` and for the
  /// starting invalidation context.
  pub fn mutation<V, R, F>(
    &self,
    entity: Entity,
    kind: MutationKind,
    options: MutationOptions<V, R>,
    call: F,
  ) -> Mutation<V, R>
  where
    V: 'static,
    R: DeserializeOwned + 'static,
    F: Fn(&Session, &V) -> FetchFuture + Send + Sync + 'static,
  {
    let session = self.clone();
    let mutate_fn = Arc::new(move |variables: &V| call(&session, variables));
    let session = self.clone();
    self
      .inner
      .client
      .use_mutation(entity, kind, mutate_fn, options)
      .with_context_fn(move || InvalidationContext::for_branch(session.branch_param()))
  }
}

fn teardown(client: &QueryClient, storage: &dyn SessionStorage) {
  client.clear();
  for key in SESSION_KEYS {
    storage.remove(key);
  }
}

impl std::fmt::Debug for Session {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Session")
      .field("branch_id", &self.branch_id())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::keys;
  use crate::storage::{MemoryStorage, ACCESS_TOKEN};
  use crate::testing::{Method, MockTransport};
  use serde_json::{json, Value};

  fn session(transport: Arc<MockTransport>) -> Session {
    let storage = Arc::new(MemoryStorage::new());
    Session::new(QueryClient::default(), transport, storage)
  }

  #[test]
  fn test_branch_selection() {
    let session = session(Arc::new(MockTransport::new()));
    assert_eq!(session.branch_id(), None);

    session.set_branch(Some(&Id::Int(3)));
    assert_eq!(session.branch_id(), Some(Id::Int(3)));
    assert_eq!(session.branch_param(), Some(Param::Int(3)));

    session.set_branch(None);
    assert_eq!(session.branch_id(), None);
  }

  #[tokio::test]
  async fn test_logout_clears_cache_and_credentials() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Get, "/branches", json!([{"id": 1, "name": "Main"}]));
    let session = session(transport);
    session.storage().set(ACCESS_TOKEN, "token");
    session.set_branch(Some(&Id::Int(1)));

    let mut query: Query<Value> = session.query(keys::branches(), "/branches".into(), true);
    query.settled().await;
    assert!(session.client().store().get(&keys::branches()).is_some());

    session.logout();
    assert!(session.client().store().is_empty());
    assert_eq!(session.storage().get(ACCESS_TOKEN), None);
    assert_eq!(session.branch_id(), None);
  }

  #[test]
  fn test_connect_builds_http_session() {
    let storage: Arc<dyn SessionStorage> = Arc::new(MemoryStorage::new());
    let session = Session::connect(
      &Config::default(),
      storage,
      Arc::new(crate::notify::NoopNotifier),
    )
    .unwrap();
    assert!(session.client().store().is_empty());
  }
}
