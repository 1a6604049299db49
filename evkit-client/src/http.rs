//! HTTP transport.
//!
//! Posts the JSON payload to `<base>/api/<resource>/<action>` for
//! path-style methods and `<base>/rpc/<name>` for legacy ones. The response
//! body is expected to be an envelope whatever the status code.

use std::time::Duration;

use async_trait::async_trait;
use evkit_core::{RouteTarget, Transport, TransportError};
use serde_json::Value;

pub const HTTP_TRANSPORT_NAME: &str = "http";

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, target: &RouteTarget) -> String {
        format!("{}/{}", self.base_url, target.endpoint())
    }
}

fn failure(message: impl Into<String>) -> TransportError {
    TransportError::Failure {
        message: message.into(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        HTTP_TRANSPORT_NAME
    }

    async fn call(&self, target: &RouteTarget, payload: Value) -> Result<Value, TransportError> {
        let url = self.url_for(target);
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| failure(e.to_string()))?;

        match serde_json::from_str::<Value>(&body) {
            Ok(value) => Ok(value),
            Err(_) if !status.is_success() => Err(failure(format!("HTTP {} from {}", status, url))),
            Err(e) => Err(TransportError::MalformedEnvelope {
                method: target.method_name(),
                reason: e.to_string(),
            }),
        }
    }
}
