//! Write operations with dependency-driven cache invalidation.
//!
//! A `Mutation` runs a create/update/delete call through the transport and,
//! only once the server confirms it, stales every cached query the
//! [`DependencyGraph`] links to the mutated entity. Nothing is written to the
//! cache speculatively.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::cache::FetchFuture;
use crate::client::QueryClient;
use crate::error::{Error, Result};
use crate::graph::{DependencyGraph, Entity, InvalidationContext, MutationKind};
use crate::notify::{Notification, NotificationKind};

/// Builds the network call for one set of variables.
pub type MutateFn<V> = Arc<dyn Fn(&V) -> FetchFuture + Send + Sync>;

/// Client-side check run before anything else.
pub type Validator<V> = Arc<dyn Fn(&V) -> Result<()> + Send + Sync>;

/// Fills in the ids a successful mutation touched, from its variables and
/// the server response.
pub type ScopeFn<V> = Arc<dyn Fn(&V, &Value, &mut InvalidationContext) + Send + Sync>;

/// Supplies the starting invalidation context each time a mutation runs.
pub type ContextFn = Arc<dyn Fn() -> InvalidationContext + Send + Sync>;

/// Caller-supplied lifecycle callbacks.
pub struct MutationOptions<V, R> {
  /// Runs synchronously before the network call. Must not touch the cache.
  pub on_mutate: Option<Box<dyn Fn(&V) + Send + Sync>>,
  pub on_success: Option<Box<dyn Fn(&R, &V) + Send + Sync>>,
  pub on_error: Option<Box<dyn Fn(&Error, &V) + Send + Sync>>,
}

impl<V, R> Default for MutationOptions<V, R> {
  fn default() -> Self {
    Self {
      on_mutate: None,
      on_success: None,
      on_error: None,
    }
  }
}

impl<V, R> MutationOptions<V, R> {
  pub fn on_mutate(mut self, f: impl Fn(&V) + Send + Sync + 'static) -> Self {
    self.on_mutate = Some(Box::new(f));
    self
  }

  pub fn on_success(mut self, f: impl Fn(&R, &V) + Send + Sync + 'static) -> Self {
    self.on_success = Some(Box::new(f));
    self
  }

  pub fn on_error(mut self, f: impl Fn(&Error, &V) + Send + Sync + 'static) -> Self {
    self.on_error = Some(Box::new(f));
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationStatus {
  Idle,
  Pending,
  Success,
  Error(String),
}

/// A reusable write operation bound to one (entity, kind) event.
pub struct Mutation<V, R> {
  client: QueryClient,
  entity: Entity,
  kind: MutationKind,
  mutate_fn: MutateFn<V>,
  options: MutationOptions<V, R>,
  validator: Option<Validator<V>>,
  scope: Option<ScopeFn<V>>,
  context: ContextFn,
  message_id: String,
  pending_text: String,
  success_text: String,
  status: Mutex<MutationStatus>,
  _response: PhantomData<fn() -> R>,
}

impl<V, R: DeserializeOwned> Mutation<V, R> {
  pub(crate) fn new(
    client: QueryClient,
    entity: Entity,
    kind: MutationKind,
    mutate_fn: MutateFn<V>,
    options: MutationOptions<V, R>,
  ) -> Self {
    Self {
      client,
      entity,
      kind,
      mutate_fn,
      options,
      validator: None,
      scope: None,
      context: Arc::new(InvalidationContext::default),
      message_id: format!("{}:{}", entity, kind),
      pending_text: "Saving...".to_string(),
      success_text: "Saved".to_string(),
      status: Mutex::new(MutationStatus::Idle),
      _response: PhantomData,
    }
  }

  pub fn with_validation(mut self, f: impl Fn(&V) -> Result<()> + Send + Sync + 'static) -> Self {
    self.validator = Some(Arc::new(f));
    self
  }

  pub fn with_scope(
    mut self,
    f: impl Fn(&V, &Value, &mut InvalidationContext) + Send + Sync + 'static,
  ) -> Self {
    self.scope = Some(Arc::new(f));
    self
  }

  /// Ids known up front, usually just the active branch.
  pub fn with_context(self, context: InvalidationContext) -> Self {
    self.with_context_fn(move || context.clone())
  }

  /// Like [`with_context`](Self::with_context), but read when `mutate` is
  /// called rather than when the handle is built.
  pub fn with_context_fn(
    mut self,
    f: impl Fn() -> InvalidationContext + Send + Sync + 'static,
  ) -> Self {
    self.context = Arc::new(f);
    self
  }

  pub fn with_messages(mut self, pending: impl Into<String>, success: impl Into<String>) -> Self {
    self.pending_text = pending.into();
    self.success_text = success.into();
    self
  }

  pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
    self.message_id = id.into();
    self
  }

  pub fn entity(&self) -> Entity {
    self.entity
  }

  pub fn kind(&self) -> MutationKind {
    self.kind
  }

  pub fn message_id(&self) -> &str {
    &self.message_id
  }

  pub fn status(&self) -> MutationStatus {
    self
      .status
      .lock()
      .map(|s| s.clone())
      .unwrap_or(MutationStatus::Idle)
  }

  pub fn is_pending(&self) -> bool {
    self.status() == MutationStatus::Pending
  }

  fn set_status(&self, status: MutationStatus) {
    if let Ok(mut current) = self.status.lock() {
      *current = status;
    }
  }

  fn notify(&self, kind: NotificationKind, text: &str) {
    self.client.notifier().notify(Notification {
      kind,
      message_id: self.message_id.clone(),
      text: text.to_string(),
    });
  }

  /// Run client-side validation only.
  pub fn validate(&self, variables: &V) -> Result<()> {
    match &self.validator {
      Some(validate) => validate(variables),
      None => Ok(()),
    }
  }

  /// Execute the mutation.
  ///
  /// Validation failures return before any notification or network call.
  /// On success the dependent queries are staled before `on_success` runs
  /// and before the success notification goes out. On failure the cache is
  /// left untouched.
  pub async fn mutate(&self, variables: V) -> Result<R> {
    self.validate(&variables)?;
    let mut context = (self.context)();

    self.set_status(MutationStatus::Pending);
    if let Some(on_mutate) = &self.options.on_mutate {
      on_mutate(&variables);
    }
    self.notify(NotificationKind::Pending, &self.pending_text);

    let payload = match (self.mutate_fn)(&variables).await {
      Ok(payload) => payload,
      Err(e) => {
        warn!(entity = %self.entity, kind = %self.kind, error = %e, "mutation failed");
        return Err(self.fail(e, &variables));
      }
    };

    if let Some(scope) = &self.scope {
      scope(&variables, &payload, &mut context);
    }
    let patterns = DependencyGraph::resolve(self.entity, self.kind, &context);
    let staled = self.client.invalidate_all(&patterns);
    info!(
      entity = %self.entity,
      kind = %self.kind,
      staled = staled.len(),
      "mutation succeeded"
    );

    let response = match serde_json::from_value::<R>(payload) {
      Ok(response) => response,
      Err(e) => return Err(self.fail(e.into(), &variables)),
    };

    if let Some(on_success) = &self.options.on_success {
      on_success(&response, &variables);
    }
    self.set_status(MutationStatus::Success);
    self.notify(NotificationKind::Success, &self.success_text);
    Ok(response)
  }

  fn fail(&self, error: Error, variables: &V) -> Error {
    if let Some(on_error) = &self.options.on_error {
      on_error(&error, variables);
    }
    let text = error.user_message();
    self.set_status(MutationStatus::Error(text.clone()));
    self.notify(NotificationKind::Error, &text);
    error
  }
}

impl<V, R> std::fmt::Debug for Mutation<V, R> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Mutation")
      .field("entity", &self.entity)
      .field("kind", &self.kind)
      .field("message_id", &self.message_id)
      .finish_non_exhaustive()
  }
}
