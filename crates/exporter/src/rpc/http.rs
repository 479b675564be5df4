use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    ChainInfo, Connector, DbSize, NetConnection, NodeApi, ProducerRecord, ProducerSchedule,
    ProducersResponse, RuntimeOptions,
};
use crate::error::RpcError;

/// Upper bound on producers requested per call; the exporter keeps the top 42.
const PRODUCER_QUERY_LIMIT: u32 = 1000;

/// nodeos HTTP API client.
pub struct HttpNodeApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpNodeApi {
    /// Create a client for `url`. A zero timeout falls back to 10 seconds.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RpcError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| RpcError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.host_str().is_none() {
            return Err(RpcError::InvalidUrl {
                url: url.to_string(),
                reason: "missing host".to_string(),
            });
        }

        let timeout = if timeout.is_zero() {
            Duration::from_secs(10)
        } else {
            timeout
        };
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }

    /// POST `body` (or nothing) to `path` and decode the JSON response.
    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, RpcError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "node request");

        let mut request = self
            .http
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| RpcError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl NodeApi for HttpNodeApi {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_info(&self) -> Result<ChainInfo, RpcError> {
        self.post_json("/v1/chain/get_info", None).await
    }

    async fn net_connections(&self) -> Result<Vec<NetConnection>, RpcError> {
        self.post_json("/v1/net/connections", None).await
    }

    async fn is_producer_paused(&self) -> Result<bool, RpcError> {
        self.post_json("/v1/producer/paused", None).await
    }

    async fn runtime_options(&self) -> Result<RuntimeOptions, RpcError> {
        self.post_json("/v1/producer/get_runtime_options", None)
            .await
    }

    async fn producers(&self) -> Result<Vec<ProducerRecord>, RpcError> {
        let body = serde_json::json!({
            "limit": PRODUCER_QUERY_LIMIT,
            "lower_bound": "",
        });
        let resp: ProducersResponse = self
            .post_json("/v1/chain/get_producers", Some(body))
            .await?;
        Ok(resp.producers)
    }

    async fn producer_schedule(&self) -> Result<ProducerSchedule, RpcError> {
        self.post_json("/v1/chain/get_producer_schedule", None)
            .await
    }

    async fn db_size(&self) -> Result<DbSize, RpcError> {
        self.post_json("/v1/db_size/get", None).await
    }
}

/// Connector producing [`HttpNodeApi`] handles that share one timeout.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Connector for HttpConnector {
    fn connect(&self, url: &str) -> Result<Arc<dyn NodeApi>, RpcError> {
        Ok(Arc::new(HttpNodeApi::new(url, self.timeout)?))
    }
}
