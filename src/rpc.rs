use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Minimal HTTP JSON-RPC 2.0 transport shared by the bundler and paymaster
/// clients. One request per call; no retries.
///
/// Request ids come from a counter owned by the transport, so clones share the
/// sequence and separate transports never interfere.
#[derive(Debug, Clone)]
pub struct JsonRpcTransport {
    url: String,
    http: reqwest::Client,
    next_id: Arc<AtomicU64>,
}

impl JsonRpcTransport {
    pub fn new(url: String) -> Self {
        Self {
            url,
            http: reqwest::Client::new(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let req = request_body(self.next_id(), method, params);

        tracing::trace!(method, url = %self.url, "json-rpc request");

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.url))?;

        let status = resp.status();
        let body: Value = resp.json().await.context("failed to decode JSON")?;

        if !status.is_success() {
            return Err(anyhow!("HTTP {}: {}", status, body));
        }

        extract_result(body)
    }
}

fn request_body(id: u64, method: &str, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

fn extract_result(body: Value) -> Result<Value> {
    if let Some(err) = body.get("error") {
        return Err(anyhow!("RPC error: {}", err));
    }

    body.get("result")
        .cloned()
        .ok_or_else(|| anyhow!("missing result field"))
}
