//! One monitored node endpoint.
//!
//! A [`Target`] owns the RPC handle for a node, the capability flags found
//! while probing it at startup, and the timestamp of its last successful
//! `get_info`. Each `fetch_*` method produces the typed update for one
//! metric kind or a [`CollectError`] for the collection task to classify.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cache::EndpointCache;
use crate::error::{Capability, CollectError, RpcError};
use crate::rpc::{Connector, NodeApi, ProducerRecord, parse_node_time};
use crate::update::{
    DbUpdate, InfoUpdate, NetUpdate, PausedUpdate, ProducerUpdate, RuntimeUpdate, ScheduleUpdate,
};

pub const MAINNET_CHAIN_ID: &str =
    "21dcae42c0182200e93f954a074011f9048a7624c6fe81d3c9541a614a88bd1c";
pub const TESTNET_CHAIN_ID: &str =
    "b20901380af44ef59c5918439a1f9a41d83669020319a80574b804a5f95cbd7e";

/// Producers reported per endpoint; the rest are noise.
pub const MAX_PRODUCERS: usize = 42;

/// Ranks below this (zero-based) are in the active top 21.
const TOP_PRODUCERS: usize = 21;

/// Vote strings are in SUFs; one FIO is 1e9 SUF.
const SUF_PER_FIO: i128 = 1_000_000_000;

/// Chain id classified for labelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chain {
    Mainnet,
    Testnet,
    Other(String),
}

impl Chain {
    pub fn classify(chain_id: &str) -> Self {
        match chain_id {
            MAINNET_CHAIN_ID => Chain::Mainnet,
            TESTNET_CHAIN_ID => Chain::Testnet,
            other => Chain::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Chain::Mainnet => "mainnet",
            Chain::Testnet => "testnet",
            Chain::Other(id) => id,
        }
    }
}

pub struct Target {
    host: String,
    url: String,
    api: Arc<dyn NodeApi>,
    cache: Arc<EndpointCache>,

    has_net: bool,
    has_producer: bool,
    has_db: bool,

    /// Unix millis of the last successful `get_info`; 0 means never.
    last: AtomicI64,
}

impl Target {
    /// Wrap an existing handle. The url identity is the handle's base url.
    pub fn new(api: Arc<dyn NodeApi>, cache: Arc<EndpointCache>) -> Result<Self, RpcError> {
        let url = api.base_url().to_string();
        let host = reqwest::Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| RpcError::InvalidUrl {
                url: url.clone(),
                reason: "missing host".to_string(),
            })?;

        Ok(Self {
            host,
            url,
            api,
            cache,
            has_net: false,
            has_producer: false,
            has_db: false,
            last: AtomicI64::new(0),
        })
    }

    /// Build a handle for `url` and verify the node answers `get_info`.
    pub async fn connect(
        connector: &dyn Connector,
        url: &str,
        cache: Arc<EndpointCache>,
    ) -> Result<Self, RpcError> {
        let api = connector.connect(url)?;
        api.get_info().await?;
        Self::new(api, cache)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Producer => self.has_producer,
            Capability::Net => self.has_net,
            Capability::Db => self.has_db,
        }
    }

    /// Time of the last successful `get_info`, if any.
    pub fn last(&self) -> Option<DateTime<Utc>> {
        match self.last.load(Ordering::Acquire) {
            0 => None,
            millis => DateTime::from_timestamp_millis(millis),
        }
    }

    /// Record a successful refresh. Never moves `last` backwards.
    fn touch(&self, at: DateTime<Utc>) {
        self.last.fetch_max(at.timestamp_millis(), Ordering::AcqRel);
    }

    /// Issue the capability's call once; the flag is set only on success.
    pub async fn probe(&mut self, capability: Capability) -> bool {
        let result = match capability {
            Capability::Producer => self.api.is_producer_paused().await.map(|_| ()),
            Capability::Net => self.api.net_connections().await.map(|_| ()),
            Capability::Db => self.api.db_size().await.map(|_| ()),
        };

        match result {
            Ok(()) => {
                match capability {
                    Capability::Producer => self.has_producer = true,
                    Capability::Net => self.has_net = true,
                    Capability::Db => self.has_db = true,
                }
                debug!(url = %self.url, capability = %capability, "capability available");
                true
            }
            Err(e) => {
                warn!(url = %self.url, capability = %capability, error = %e, "not checking capability");
                false
            }
        }
    }

    fn require(&self, capability: Capability) -> Result<(), CollectError> {
        if self.has(capability) {
            Ok(())
        } else {
            Err(CollectError::NotMonitored(capability))
        }
    }

    pub async fn fetch_info(&self) -> Result<InfoUpdate, CollectError> {
        let info = self.api.get_info().await?;
        let now = Utc::now();
        self.touch(now);

        let chain = Chain::classify(&info.chain_id);
        self.cache
            .upsert(&self.url, chain.label(), &info.server_version_string);

        Ok(InfoUpdate {
            head: info.head_block_num as f64,
            lib: info.last_irreversible_block_num as f64,
            head_lag: seconds_between(info.head_block_time, now),
            endpoint: self.host.clone(),
            url: self.url.clone(),
        })
    }

    pub async fn fetch_net(&self) -> Result<NetUpdate, CollectError> {
        self.require(Capability::Net)?;
        let connections = self.api.net_connections().await?;

        let mut connected = 0.0;
        let mut disconnected = 0.0;
        let mut syncing = 0.0;
        for conn in &connections {
            if conn.connecting {
                disconnected += 1.0;
            } else {
                connected += 1.0;
            }
            if conn.syncing {
                syncing += 1.0;
            }
        }

        Ok(NetUpdate {
            connected,
            disconnected,
            syncing,
            endpoint: self.host.clone(),
            url: self.url.clone(),
        })
    }

    pub async fn fetch_paused(&self) -> Result<PausedUpdate, CollectError> {
        self.require(Capability::Producer)?;
        if self.api.is_producer_paused().await? {
            return Err(CollectError::Null);
        }

        Ok(PausedUpdate {
            active: 1.0,
            endpoint: self.host.clone(),
            url: self.url.clone(),
        })
    }

    pub async fn fetch_runtime(&self) -> Result<RuntimeUpdate, CollectError> {
        self.require(Capability::Producer)?;
        let options = self.api.runtime_options().await?;

        Ok(RuntimeUpdate {
            max_transaction_time: options.max_transaction_time,
            endpoint: self.host.clone(),
            url: self.url.clone(),
        })
    }

    pub async fn fetch_producers(&self) -> Result<Vec<ProducerUpdate>, CollectError> {
        let records = self.api.producers().await?;
        producer_updates(&records, Utc::now(), &self.host, &self.url)
    }

    pub async fn fetch_schedule(&self) -> Result<ScheduleUpdate, CollectError> {
        let schedule = self.api.producer_schedule().await?;

        Ok(ScheduleUpdate {
            active: schedule.active.version as f64,
            pending: schedule.pending.map_or(0.0, |s| s.version as f64),
            proposed: schedule.proposed.map_or(0.0, |s| s.version as f64),
            endpoint: self.host.clone(),
            url: self.url.clone(),
        })
    }

    pub async fn fetch_db(&self) -> Result<DbUpdate, CollectError> {
        self.require(Capability::Db)?;
        let size = self.api.db_size().await?;

        Ok(DbUpdate {
            free: size.free_bytes as f64,
            used: size.used_bytes as f64,
            endpoint: self.host.clone(),
            url: self.url.clone(),
        })
    }
}

/// Whole seconds from `earlier` to `later`.
fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later.timestamp() - earlier.timestamp()) as f64
}

/// Integer part of a dot-delimited vote string, scaled from SUF to FIO
/// with truncating division.
pub(crate) fn parse_votes(raw: &str) -> Result<i128, std::num::ParseIntError> {
    let whole = raw.split('.').next().unwrap_or_default();
    Ok(whole.parse::<i128>()? / SUF_PER_FIO)
}

/// Convert the ranked producer list into updates. The first malformed
/// record fails the whole batch.
pub(crate) fn producer_updates(
    records: &[ProducerRecord],
    now: DateTime<Utc>,
    endpoint: &str,
    url: &str,
) -> Result<Vec<ProducerUpdate>, CollectError> {
    records
        .iter()
        .take(MAX_PRODUCERS)
        .enumerate()
        .map(|(index, record)| {
            let last_claim = parse_node_time(&record.last_claim_time).map_err(|e| {
                CollectError::MalformedProducer {
                    index,
                    reason: format!("last_claim_time {:?}: {e}", record.last_claim_time),
                }
            })?;
            let votes =
                parse_votes(&record.total_votes).map_err(|e| CollectError::MalformedProducer {
                    index,
                    reason: format!("total_votes {:?}: {e}", record.total_votes),
                })?;
            let is_top21 = index < TOP_PRODUCERS && record.is_active != 0;

            Ok(ProducerUpdate {
                active: record.is_active as f64,
                is_top21: if is_top21 { 1.0 } else { 0.0 },
                last_claim_delta: seconds_between(last_claim, now),
                rank: (index + 1) as f64,
                votes: votes as f64,
                producer: record.fio_address.clone(),
                endpoint: endpoint.to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}
