//! HTTP bridge to the provider SDK.

use async_trait::async_trait;
use gwcache_core::ports::ProviderInvoker;
use gwcache_core::{Error, InvokeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:4599";

/// Bridge connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_BRIDGE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BridgeConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    service: &'a str,
    method: &'a str,
    params: &'a Value,
    region: &'a str,
}

/// Error body returned by the bridge on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct BridgeErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Posts `{service, method, params, region}` to `<endpoint>/invoke`.
pub struct HttpInvoker {
    client: reqwest::Client,
    invoke_url: Url,
}

impl HttpInvoker {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        let base = Url::parse(config.endpoint.trim_end_matches('/'))
            .map_err(|e| Error::InvalidConfig(format!("bridge endpoint {}: {}", config.endpoint, e)))?;
        let invoke_url = Url::parse(&format!("{}/invoke", base.as_str().trim_end_matches('/')))
            .map_err(|e| Error::InvalidConfig(format!("bridge endpoint {}: {}", config.endpoint, e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self { client, invoke_url })
    }

    pub fn invoke_url(&self) -> &Url {
        &self.invoke_url
    }
}

#[async_trait]
impl ProviderInvoker for HttpInvoker {
    async fn invoke(
        &self,
        service: &str,
        method: &str,
        params: Value,
        region: &str,
    ) -> std::result::Result<Value, InvokeError> {
        debug!(service, method, region, "Invoking provider API");

        let request = InvokeRequest {
            service,
            method,
            params: &params,
            region,
        };
        let response = self
            .client
            .post(self.invoke_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| InvokeError::new(service, method, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| InvokeError::new(service, method, format!("Invalid response body: {e}")));
        }

        let text = response.text().await.unwrap_or_default();
        let body: BridgeErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let message = body
            .message
            .filter(|m| !m.is_empty())
            .or_else(|| (!text.is_empty()).then(|| text.clone()))
            .unwrap_or_else(|| status.to_string());
        warn!(service, method, status = status.as_u16(), code = ?body.code, "Provider API call failed");

        let mut error = InvokeError::new(service, method, message).with_status(status.as_u16());
        if let Some(code) = body.code {
            error = error.with_code(code);
        }
        Err(error)
    }
}
