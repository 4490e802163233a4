//! Log store client - source of request/response detail records.
//!
//! The resolver only sees the [`DetailSource`] port; [`HttpLogStore`] is the
//! adapter for the platform's structured log endpoint.

use std::time::Duration;

use async_trait::async_trait;
use shared_types::{DetailBundle, DetailRecord};

pub const STRUCTURED_LOGS_PATH: &str = "/api/dev/logs/structured";

/// Errors from a detail lookup
#[derive(Debug, thiserror::Error)]
pub enum LogStoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Log store returned {status} for log_id={log_id}")]
    Status { status: u16, log_id: String },

    #[error("Unexpected log store response: {0}")]
    Decode(String),

    #[error("Log store is not configured")]
    NotConfigured,
}

/// Anything that can answer a detail lookup for one log identifier.
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn fetch_detail(&self, log_id: &str) -> Result<DetailBundle, LogStoreError>;
}

/// HTTP client for the structured log endpoint
#[derive(Debug, Clone)]
pub struct HttpLogStore {
    base_url: String,
    http: reqwest::Client,
}

impl HttpLogStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LogStoreError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, STRUCTURED_LOGS_PATH)
    }
}

#[async_trait]
impl DetailSource for HttpLogStore {
    async fn fetch_detail(&self, log_id: &str) -> Result<DetailBundle, LogStoreError> {
        let response = self
            .http
            .get(self.endpoint())
            .query(&[("log_id", log_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LogStoreError::Status {
                status: status.as_u16(),
                log_id: log_id.to_string(),
            });
        }

        let body: serde_json::Value = response.json().await?;
        parse_bundle(log_id, body)
    }
}

/// Accepts either `{ "log_id": .., "requests": [..] }` or a bare record array.
pub fn parse_bundle(log_id: &str, body: serde_json::Value) -> Result<DetailBundle, LogStoreError> {
    match body {
        serde_json::Value::Array(_) => {
            let requests: Vec<DetailRecord> = serde_json::from_value(body)
                .map_err(|e| LogStoreError::Decode(e.to_string()))?;
            Ok(DetailBundle {
                log_id: log_id.to_string(),
                requests,
            })
        }
        serde_json::Value::Object(_) => {
            let mut bundle: DetailBundle = serde_json::from_value(with_default_log_id(body, log_id))
                .map_err(|e| LogStoreError::Decode(e.to_string()))?;
            if bundle.log_id.trim().is_empty() {
                bundle.log_id = log_id.to_string();
            }
            Ok(bundle)
        }
        other => Err(LogStoreError::Decode(format!(
            "expected object or array, got {}",
            json_kind(&other)
        ))),
    }
}

fn with_default_log_id(mut body: serde_json::Value, log_id: &str) -> serde_json::Value {
    if let Some(obj) = body.as_object_mut() {
        let missing = !obj.get("log_id").is_some_and(|v| v.is_string());
        if missing {
            obj.insert("log_id".to_string(), serde_json::json!(log_id));
        }
    }
    body
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
