//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! Transport failures (connection errors, timeouts, non-2xx statuses) are
//! retried with exponential backoff. A JSON-RPC error object is an answer,
//! not a transport failure, and is returned to the caller immediately.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use blockdex_core::config::RpcConfig;
use blockdex_core::error::IndexerError;

use crate::request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::retry::{RetryConfig, RetryPolicy};

/// Why a single call failed.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Rpc(JsonRpcError),

    #[error("cannot decode {method} result: {reason}")]
    Decode { method: String, reason: String },
}

impl From<CallError> for IndexerError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Transport(msg) => IndexerError::Rpc(msg),
            CallError::Rpc(e) => IndexerError::Rpc(e.to_string()),
            CallError::Decode { method, reason } => IndexerError::decode(method, reason),
        }
    }
}

/// HTTP JSON-RPC client. Safe for concurrent use; clone-free sharing via `Arc`.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    /// Create a client for the given endpoint URL.
    pub fn new(url: impl Into<String>, config: &RpcConfig) -> Result<Self, IndexerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| IndexerError::Config(format!("http client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            retry: RetryPolicy::new(RetryConfig::from(config)),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call `method` and decode its result into `T`.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, CallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);

        let mut attempt = 0u32;
        let resp = loop {
            attempt += 1;
            match self.send_once(&req).await {
                Ok(resp) => break resp,
                Err(e) => match self.retry.next_delay(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            method,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            url = %self.url,
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::error!(method, attempt, error = %e, url = %self.url, "max retries exceeded");
                        return Err(e);
                    }
                },
            }
        };

        let result = resp.into_result().map_err(CallError::Rpc)?;
        serde_json::from_value(result).map_err(|e| CallError::Decode {
            method: method.to_string(),
            reason: e.to_string(),
        })
    }

    async fn send_once(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, CallError> {
        let resp = self
            .http
            .post(&self.url)
            .json(req)
            .send()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(CallError::Transport(format!("HTTP {status}: {body}")));
        }

        resp.json::<JsonRpcResponse>()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))
    }
}
