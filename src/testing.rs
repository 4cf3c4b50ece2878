//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::Transport;
use crate::cache::Fetcher;
use crate::error::{Error, Result};

/// Fetcher that returns `value` after `delay` and counts its invocations.
pub fn counting_fetcher(value: Value, delay: Duration) -> (Fetcher, Arc<AtomicUsize>) {
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = calls.clone();
  let fetcher: Fetcher = Arc::new(move || {
    counter.fetch_add(1, Ordering::SeqCst);
    let value = value.clone();
    async move {
      if !delay.is_zero() {
        tokio::time::sleep(delay).await;
      }
      Ok(value)
    }
    .boxed()
  });
  (fetcher, calls)
}

/// Fetcher that always fails with `message`.
pub fn failing_fetcher(message: &'static str) -> Fetcher {
  Arc::new(move || async move { Err(Error::transport(Some(500), message)) }.boxed())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
  Get,
  Post,
  Put,
  Delete,
}

#[derive(Debug, Clone)]
pub struct Call {
  pub method: Method,
  pub path: String,
  pub body: Option<Value>,
}

/// Scripted transport. Unscripted calls answer `null`.
#[derive(Default)]
pub struct MockTransport {
  responses: Mutex<HashMap<(Method, String), Result<Value>>>,
  calls: Mutex<Vec<Call>>,
  delay: Duration,
}

impl MockTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn respond(&self, method: Method, path: &str, value: Value) {
    self
      .responses
      .lock()
      .unwrap()
      .insert((method, path.to_string()), Ok(value));
  }

  pub fn fail(&self, method: Method, path: &str, error: Error) {
    self
      .responses
      .lock()
      .unwrap()
      .insert((method, path.to_string()), Err(error));
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn count(&self, method: Method, path: &str) -> usize {
    self
      .calls()
      .iter()
      .filter(|c| c.method == method && c.path == path)
      .count()
  }

  async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
    self.calls.lock().unwrap().push(Call {
      method,
      path: path.to_string(),
      body,
    });
    let response = self
      .responses
      .lock()
      .unwrap()
      .get(&(method, path.to_string()))
      .cloned()
      .unwrap_or(Ok(Value::Null));
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    response
  }
}

#[async_trait]
impl Transport for MockTransport {
  async fn get(&self, path: &str) -> Result<Value> {
    self.call(Method::Get, path, None).await
  }

  async fn post(&self, path: &str, body: Value) -> Result<Value> {
    self.call(Method::Post, path, Some(body)).await
  }

  async fn put(&self, path: &str, body: Value) -> Result<Value> {
    self.call(Method::Put, path, Some(body)).await
  }

  async fn delete(&self, path: &str) -> Result<Value> {
    self.call(Method::Delete, path, None).await
  }
}
