//! Node RPC interface.
//!
//! The exporter only ever talks to a node through [`NodeApi`]. The
//! production implementation is [`HttpNodeApi`], which speaks the nodeos
//! HTTP API; tests substitute their own implementation.

mod http;
#[cfg(test)]
pub(crate) mod mock;

pub use http::{HttpConnector, HttpNodeApi};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::RpcError;

/// Timestamp layout used by nodeos (UTC, no zone suffix, optional millis).
const NODE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parse a nodeos timestamp such as `2024-03-01T12:00:00.500`.
pub fn parse_node_time(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, NODE_TIME_FORMAT).map(|t| t.and_utc())
}

fn deserialize_node_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_node_time(&raw).map_err(serde::de::Error::custom)
}

/// `chain/get_info` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainInfo {
    pub chain_id: String,
    pub head_block_num: u64,
    pub last_irreversible_block_num: u64,
    #[serde(deserialize_with = "deserialize_node_time")]
    pub head_block_time: DateTime<Utc>,
    #[serde(default)]
    pub server_version_string: String,
}

/// One entry of `net/connections`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetConnection {
    #[serde(default)]
    pub peer: String,
    #[serde(default)]
    pub connecting: bool,
    #[serde(default)]
    pub syncing: bool,
}

/// `producer/get_runtime_options` response (only the field we report).
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeOptions {
    pub max_transaction_time: f64,
}

/// One entry of `chain/get_producers`. Times and votes stay raw so that a
/// malformed record can fail the batch it belongs to.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProducerRecord {
    #[serde(default)]
    pub owner: String,
    pub fio_address: String,
    pub total_votes: String,
    pub is_active: i64,
    pub last_claim_time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProducersResponse {
    pub producers: Vec<ProducerRecord>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Schedule {
    pub version: u64,
}

/// `chain/get_producer_schedule` response. Pending and proposed are null
/// when no schedule change is in flight.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProducerSchedule {
    #[serde(default)]
    pub active: Schedule,
    #[serde(default)]
    pub pending: Option<Schedule>,
    #[serde(default)]
    pub proposed: Option<Schedule>,
}

/// `db_size/get` response.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DbSize {
    pub free_bytes: u64,
    pub used_bytes: u64,
}

/// Calls the exporter makes against a single node.
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// Base url of the node, used as its identity.
    fn base_url(&self) -> &str;

    async fn get_info(&self) -> Result<ChainInfo, RpcError>;

    async fn net_connections(&self) -> Result<Vec<NetConnection>, RpcError>;

    async fn is_producer_paused(&self) -> Result<bool, RpcError>;

    /// Raw POST to `producer/get_runtime_options`; the typed client has no
    /// wrapper for it.
    async fn runtime_options(&self) -> Result<RuntimeOptions, RpcError>;

    /// Producers in rank order.
    async fn producers(&self) -> Result<Vec<ProducerRecord>, RpcError>;

    async fn producer_schedule(&self) -> Result<ProducerSchedule, RpcError>;

    async fn db_size(&self) -> Result<DbSize, RpcError>;
}

/// Builds a [`NodeApi`] handle for an endpoint url.
pub trait Connector: Send + Sync {
    fn connect(&self, url: &str) -> Result<Arc<dyn NodeApi>, RpcError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_node_time_with_millis() {
        let t = parse_node_time("2024-03-01T12:34:56.500").expect("should parse");
        assert_eq!(t.year(), 2024);
        assert_eq!(t.hour(), 12);
        assert_eq!(t.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_parse_node_time_without_millis() {
        let t = parse_node_time("2024-03-01T12:34:56").expect("should parse");
        assert_eq!(t.second(), 56);
    }

    #[test]
    fn test_parse_node_time_rejects_garbage() {
        assert!(parse_node_time("yesterday").is_err());
    }

    #[test]
    fn test_chain_info_decode() {
        let body = r#"{
            "server_version": "abc123",
            "chain_id": "21dcae42c0182200e93f954a074011f9048a7624c6fe81d3c9541a614a88bd1c",
            "head_block_num": 1000,
            "last_irreversible_block_num": 990,
            "head_block_time": "2024-03-01T12:00:00.000",
            "server_version_string": "v3.5.0"
        }"#;
        let info: ChainInfo = serde_json::from_str(body).expect("should decode");
        assert_eq!(info.head_block_num, 1000);
        assert_eq!(info.last_irreversible_block_num, 990);
        assert_eq!(info.server_version_string, "v3.5.0");
    }

    #[test]
    fn test_schedule_decode_with_nulls() {
        let body = r#"{"active":{"version":7,"producers":[]},"pending":null,"proposed":null}"#;
        let sched: ProducerSchedule = serde_json::from_str(body).expect("should decode");
        assert_eq!(sched.active.version, 7);
        assert!(sched.pending.is_none());
        assert!(sched.proposed.is_none());
    }

    #[test]
    fn test_net_connection_decode_defaults() {
        let body = r#"[{"peer":"a:9876","connecting":true},{"peer":"b:9876","syncing":true}]"#;
        let conns: Vec<NetConnection> = serde_json::from_str(body).expect("should decode");
        assert!(conns[0].connecting);
        assert!(!conns[0].syncing);
        assert!(!conns[1].connecting);
        assert!(conns[1].syncing);
    }
}
