use async_trait::async_trait;
use color_eyre::eyre::eyre;
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::transport::Transport;
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::storage::{SessionStorage, ACCESS_TOKEN, REFRESH_TOKEN};

type AuthExpiredHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPair {
  access_token: String,
  refresh_token: Option<String>,
}

/// reqwest-backed transport for the admin API.
#[derive(Clone)]
pub struct HttpTransport {
  http: reqwest::Client,
  base_url: String,
  refresh_path: String,
  storage: Arc<dyn SessionStorage>,
  on_auth_expired: Option<AuthExpiredHook>,
  /// Serializes token refreshes so concurrent 401s refresh once
  refresh_lock: Arc<Mutex<()>>,
}

impl HttpTransport {
  pub fn new(config: &ApiConfig, storage: Arc<dyn SessionStorage>) -> color_eyre::Result<Self> {
    let url = config.resolved_url();
    reqwest::Url::parse(&url).map_err(|e| eyre!("Invalid API url {}: {}", url, e))?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url: url.trim_end_matches('/').to_string(),
      refresh_path: config.refresh_path.clone(),
      storage,
      on_auth_expired: None,
      refresh_lock: Arc::new(Mutex::new(())),
    })
  }

  /// Called once the session is definitively expired, after tokens have been
  /// removed from storage.
  pub fn on_auth_expired(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
    self.on_auth_expired = Some(Arc::new(hook));
    self
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  async fn send_once(
    &self,
    method: &Method,
    path: &str,
    body: Option<&Value>,
  ) -> Result<(Response, Option<String>)> {
    let token = self.storage.get(ACCESS_TOKEN);
    let mut request = self.http.request(method.clone(), self.url(path));
    if let Some(token) = &token {
      request = request.bearer_auth(token);
    }
    if let Some(body) = body {
      request = request.json(body);
    }
    let response = request.send().await?;
    Ok((response, token))
  }

  async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
    debug!(%method, path, "request");
    let (response, token_used) = self.send_once(&method, path, body.as_ref()).await?;
    if response.status() != StatusCode::UNAUTHORIZED {
      return parse_response(response).await;
    }

    if let Err(e) = self.refresh(token_used.as_deref()).await {
      debug!(error = %e, "token refresh failed");
      return Err(self.expire());
    }

    let (retry, _) = self.send_once(&method, path, body.as_ref()).await?;
    if retry.status() == StatusCode::UNAUTHORIZED {
      return Err(self.expire());
    }
    parse_response(retry).await
  }

  async fn refresh(&self, token_used: Option<&str>) -> Result<()> {
    let _guard = self.refresh_lock.lock().await;

    // Another request may have refreshed while we waited
    let current = self.storage.get(ACCESS_TOKEN);
    if current.is_some() && current.as_deref() != token_used {
      return Ok(());
    }

    let refresh_token = self.storage.get(REFRESH_TOKEN).ok_or(Error::AuthExpired)?;
    let response = self
      .http
      .post(self.url(&self.refresh_path))
      .json(&json!({ "refreshToken": refresh_token }))
      .send()
      .await?;
    if !response.status().is_success() {
      return Err(Error::AuthExpired);
    }

    let tokens: TokenPair = response.json().await?;
    self.storage.set(ACCESS_TOKEN, &tokens.access_token);
    if let Some(refresh_token) = tokens.refresh_token {
      self.storage.set(REFRESH_TOKEN, &refresh_token);
    }
    info!("access token refreshed");
    Ok(())
  }

  fn expire(&self) -> Error {
    warn!("session expired");
    self.storage.remove(ACCESS_TOKEN);
    self.storage.remove(REFRESH_TOKEN);
    if let Some(hook) = &self.on_auth_expired {
      hook();
    }
    Error::AuthExpired
  }
}

async fn parse_response(response: Response) -> Result<Value> {
  let status = response.status();
  let bytes = response.bytes().await?;
  if status.is_success() {
    if bytes.is_empty() {
      return Ok(Value::Null);
    }
    return Ok(serde_json::from_slice(&bytes)?);
  }
  Err(error_from_body(status.as_u16(), &bytes))
}

/// Build a transport error, preferring the server's `message` field.
pub fn error_from_body(status: u16, body: &[u8]) -> Error {
  let server_message = serde_json::from_slice::<Value>(body).ok().and_then(|v| {
    v.get("message")
      .and_then(|m| m.as_str())
      .filter(|m| !m.trim().is_empty())
      .map(String::from)
  });
  let message =
    server_message.unwrap_or_else(|| format!("Request failed with status {}", status));
  Error::transport(Some(status), message)
}

#[async_trait]
impl Transport for HttpTransport {
  async fn get(&self, path: &str) -> Result<Value> {
    self.send(Method::GET, path, None).await
  }

  async fn post(&self, path: &str, body: Value) -> Result<Value> {
    self.send(Method::POST, path, Some(body)).await
  }

  async fn put(&self, path: &str, body: Value) -> Result<Value> {
    self.send(Method::PUT, path, Some(body)).await
  }

  async fn delete(&self, path: &str) -> Result<Value> {
    self.send(Method::DELETE, path, None).await
  }
}
