use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use tracing::warn;

use crate::config::{backend_connect_timeout, backend_http_timeout};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

/// REST persistence for campaign collections (`maps`, `shops`, ...).
#[async_trait]
pub trait CollectionBackend: Send + Sync {
    async fn list(&self, collection: &str) -> Result<Vec<Value>, BackendError>;
    /// Returns the backend's answer (e.g. `{"id": 12}`), or `null` when it sent no JSON.
    async fn create(&self, collection: &str, record: &Value) -> Result<Value, BackendError>;
    async fn update(&self, collection: &str, id: &str, record: &Value)
    -> Result<(), BackendError>;
    async fn delete(&self, collection: &str, id: &str) -> Result<(), BackendError>;
}

#[derive(Debug, Clone)]
pub struct RestBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl RestBackend {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let base_url =
            Url::parse(base_url).map_err(|e| BackendError::InvalidUrl(format!("{base_url}: {e}")))?;
        let request_timeout = backend_http_timeout();
        let connect_timeout = backend_connect_timeout();
        let client = reqwest::Client::builder()
            .user_agent("tablero-shell/0.1")
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .or_else(|e| {
                warn!(
                    error = %e,
                    "failed to build configured HTTP client, retrying without custom user-agent"
                );
                reqwest::Client::builder()
                    .timeout(request_timeout)
                    .connect_timeout(connect_timeout)
                    .build()
            })?;
        Ok(Self { client, base_url })
    }

    /// `{base}/{collection}` or `{base}/{collection}/{id}`, percent-encoded.
    pub fn record_url(&self, collection: &str, id: Option<&str>) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| BackendError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().push(collection);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status { status, body })
    }
}

#[async_trait]
impl CollectionBackend for RestBackend {
    async fn list(&self, collection: &str) -> Result<Vec<Value>, BackendError> {
        let url = self.record_url(collection, None)?;
        let response = Self::check(self.client.get(url).send().await?).await?;
        match response.json::<Value>().await? {
            Value::Array(records) => Ok(records),
            other => Err(BackendError::Decode(format!(
                "expected array for {collection}, got {}",
                json_kind(&other)
            ))),
        }
    }

    async fn create(&self, collection: &str, record: &Value) -> Result<Value, BackendError> {
        let url = self.record_url(collection, None)?;
        let response = Self::check(self.client.post(url).json(record).send().await?).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        record: &Value,
    ) -> Result<(), BackendError> {
        let url = self.record_url(collection, Some(id))?;
        Self::check(self.client.put(url).json(record).send().await?).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        let url = self.record_url(collection, Some(id))?;
        Self::check(self.client.delete(url).send().await?).await?;
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
