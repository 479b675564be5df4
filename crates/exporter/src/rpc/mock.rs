//! In-memory [`NodeApi`] used by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::{
    ChainInfo, DbSize, NetConnection, NodeApi, ProducerRecord, ProducerSchedule, RuntimeOptions,
    Schedule,
};
use crate::error::RpcError;

pub(crate) const MAINNET: &str =
    "21dcae42c0182200e93f954a074011f9048a7624c6fe81d3c9541a614a88bd1c";

/// Canned responses; a `None` field answers with a 503.
pub(crate) struct MockNode {
    pub base_url: String,
    pub info: Option<ChainInfo>,
    pub net: Option<Vec<NetConnection>>,
    pub paused: Option<bool>,
    pub runtime: Option<f64>,
    pub producers: Option<Vec<ProducerRecord>>,
    pub schedule: Option<ProducerSchedule>,
    pub db: Option<DbSize>,
    calls: AtomicUsize,
}

impl MockNode {
    /// A node answering every call successfully.
    pub fn healthy(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            info: Some(ChainInfo {
                chain_id: MAINNET.to_string(),
                head_block_num: 1_000,
                last_irreversible_block_num: 990,
                head_block_time: Utc::now() - Duration::seconds(2),
                server_version_string: "v3.5.0".to_string(),
            }),
            net: Some(vec![
                NetConnection {
                    peer: "a".into(),
                    connecting: false,
                    syncing: true,
                },
                NetConnection {
                    peer: "b".into(),
                    connecting: true,
                    syncing: false,
                },
            ]),
            paused: Some(false),
            runtime: Some(30.0),
            producers: Some(producer_records(3)),
            schedule: Some(ProducerSchedule {
                active: Schedule { version: 12 },
                pending: None,
                proposed: Some(Schedule { version: 13 }),
            }),
            db: Some(DbSize {
                free_bytes: 1_000,
                used_bytes: 500,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of calls made against this node.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer<T: Clone>(&self, path: &str, value: &Option<T>) -> Result<T, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        value.clone().ok_or_else(|| RpcError::Status {
            path: path.to_string(),
            status: 503,
            body: "unavailable".to_string(),
        })
    }
}

/// `n` well-formed producer records ranked in order.
pub(crate) fn producer_records(n: usize) -> Vec<ProducerRecord> {
    (0..n)
        .map(|i| ProducerRecord {
            owner: format!("owner{i}"),
            fio_address: format!("bp{i}@fiotest"),
            total_votes: format!("{}000000000.0000", 1_000 - i),
            is_active: 1,
            last_claim_time: "2024-01-01T00:00:00.000".to_string(),
        })
        .collect()
}

#[async_trait]
impl NodeApi for MockNode {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_info(&self) -> Result<ChainInfo, RpcError> {
        self.answer("/v1/chain/get_info", &self.info)
    }

    async fn net_connections(&self) -> Result<Vec<NetConnection>, RpcError> {
        self.answer("/v1/net/connections", &self.net)
    }

    async fn is_producer_paused(&self) -> Result<bool, RpcError> {
        self.answer("/v1/producer/paused", &self.paused)
    }

    async fn runtime_options(&self) -> Result<RuntimeOptions, RpcError> {
        self.answer("/v1/producer/get_runtime_options", &self.runtime)
            .map(|max_transaction_time| RuntimeOptions {
                max_transaction_time,
            })
    }

    async fn producers(&self) -> Result<Vec<ProducerRecord>, RpcError> {
        self.answer("/v1/chain/get_producers", &self.producers)
    }

    async fn producer_schedule(&self) -> Result<ProducerSchedule, RpcError> {
        self.answer("/v1/chain/get_producer_schedule", &self.schedule)
    }

    async fn db_size(&self) -> Result<DbSize, RpcError> {
        self.answer("/v1/db_size/get", &self.db)
    }
}
