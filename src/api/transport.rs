//! Transport capability the coordinator consumes.

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;

use crate::cache::Fetcher;
use crate::error::Result;

/// Authenticated JSON-over-HTTP calls against the admin API.
///
/// Implementations attach the bearer token when one is stored and, on an
/// authorization failure, try exactly one token refresh and one retry before
/// giving up with [`crate::Error::AuthExpired`].
#[async_trait]
pub trait Transport: Send + Sync {
  async fn get(&self, path: &str) -> Result<Value>;
  async fn post(&self, path: &str, body: Value) -> Result<Value>;
  async fn put(&self, path: &str, body: Value) -> Result<Value>;
  async fn delete(&self, path: &str) -> Result<Value>;
}

/// A fetch function that GETs `path`.
pub fn get_fetcher(transport: Arc<dyn Transport>, path: String) -> Fetcher {
  Arc::new(move || {
    let transport = Arc::clone(&transport);
    let path = path.clone();
    async move { transport.get(&path).await }.boxed()
  })
}
