//! JSON-RPC client with ordered endpoint failover.

use crate::error::{Result, TrackerError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Ledger history method on the indexer.
pub const GET_ACCOUNT_HISTORY: &str = "condenser_api.get_account_history";

/// A JSON-RPC 2.0 request body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
    pub id: u64,
}

impl RpcRequest {
    pub fn new(method: &str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        }
    }
}

/// A JSON-RPC 2.0 response body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl RpcResponse {
    pub fn ok(result: serde_json::Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn err(error: serde_json::Value) -> Self {
        Self {
            result: None,
            error: Some(error),
        }
    }

    /// The result payload, or a description of why there is none.
    fn into_result(self) -> std::result::Result<serde_json::Value, String> {
        if let Some(error) = self.error {
            return Err(format!("endpoint returned error: {}", error));
        }
        match self.result {
            Some(serde_json::Value::Null) | None => Err("response carried no result".to_string()),
            Some(value) => Ok(value),
        }
    }
}

/// Delivers one request to one endpoint.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn post(&self, endpoint: &str, request: &RpcRequest) -> Result<RpcResponse>;
}

/// HTTP transport backed by `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn post(&self, endpoint: &str, request: &RpcRequest) -> Result<RpcResponse> {
        let response = self.client.post(endpoint).json(request).send().await?;
        Ok(response.json::<RpcResponse>().await?)
    }
}

/// Issues one logical call against an ordered list of endpoints.
///
/// Each endpoint is tried at most once per call, in list order, under a
/// per-attempt timeout. The first structured, non-error response wins.
pub struct FailoverClient<T: RpcTransport = HttpTransport> {
    endpoints: Vec<String>,
    transport: T,
    attempt_timeout: Duration,
}

impl FailoverClient<HttpTransport> {
    /// Client over HTTP with the given per-attempt timeout.
    pub fn http(endpoints: Vec<String>, attempt_timeout: Duration) -> Result<Self> {
        let transport = HttpTransport::new(attempt_timeout)?;
        Self::new(endpoints, transport, attempt_timeout)
    }
}

impl<T: RpcTransport> FailoverClient<T> {
    pub fn new(endpoints: Vec<String>, transport: T, attempt_timeout: Duration) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(TrackerError::InvalidConfig(
                "at least one RPC endpoint is required".into(),
            ));
        }
        Ok(Self {
            endpoints,
            transport,
            attempt_timeout,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Call `method` and return the raw result, or `None` when every
    /// endpoint failed.
    pub async fn call(&self, method: &str, params: serde_json::Value) -> Option<serde_json::Value> {
        self.call_as(method, params).await
    }

    /// Call `method` and decode the result.
    ///
    /// A result that does not decode as `R` counts as a soft failure of that
    /// endpoint, like a transport error or an explicit error field.
    pub async fn call_as<R: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Option<R> {
        let request = RpcRequest::new(method, params);

        for endpoint in &self.endpoints {
            let attempt =
                tokio::time::timeout(self.attempt_timeout, self.transport.post(endpoint, &request))
                    .await;

            let response = match attempt {
                Err(_) => {
                    warn!(endpoint = %endpoint, method, "endpoint timed out");
                    continue;
                }
                Ok(Err(e)) => {
                    warn!(endpoint = %endpoint, method, error = %e, "endpoint request failed");
                    continue;
                }
                Ok(Ok(response)) => response,
            };

            let value = match response.into_result() {
                Ok(value) => value,
                Err(reason) => {
                    warn!(endpoint = %endpoint, method, %reason, "endpoint gave no usable result");
                    continue;
                }
            };

            match serde_json::from_value::<R>(value) {
                Ok(decoded) => {
                    debug!(endpoint = %endpoint, method, "call succeeded");
                    return Some(decoded);
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, method, error = %e, "endpoint result did not decode");
                }
            }
        }

        warn!(method, endpoints = self.endpoints.len(), "all endpoints exhausted");
        None
    }
}
