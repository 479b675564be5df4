//! Typed per-kind metric updates.
//!
//! Updates carry numeric values plus the endpoint display name and url.
//! Chain id and version are absent: the aggregator resolves
//! them from the endpoint cache when it writes the sample.

use std::fmt;

use crate::metrics::{EndpointLabels, ExporterMetrics};

/// One of the metric kinds collected per target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Info,
    Net,
    Paused,
    Runtime,
    Producer,
    Schedule,
    Db,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Info => "info",
            MetricKind::Net => "net",
            MetricKind::Paused => "paused",
            MetricKind::Runtime => "runtime",
            MetricKind::Producer => "producer",
            MetricKind::Schedule => "schedule",
            MetricKind::Db => "db",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract shared by every update type consumed by an aggregator.
pub trait MetricUpdate: Send + 'static {
    const KIND: MetricKind;

    /// Host display name of the target that produced the update.
    fn endpoint(&self) -> &str;

    /// Endpoint url, the cache lookup key.
    fn url(&self) -> &str;

    /// Write every value to its gauge family.
    fn record(&self, metrics: &ExporterMetrics, labels: &EndpointLabels<'_>);
}

macro_rules! endpoint_accessors {
    () => {
        fn endpoint(&self) -> &str {
            &self.endpoint
        }

        fn url(&self) -> &str {
            &self.url
        }
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfoUpdate {
    pub head: f64,
    pub lib: f64,
    /// Seconds between now and the head block time.
    pub head_lag: f64,
    pub endpoint: String,
    pub url: String,
}

impl MetricUpdate for InfoUpdate {
    const KIND: MetricKind = MetricKind::Info;
    endpoint_accessors!();

    fn record(&self, metrics: &ExporterMetrics, labels: &EndpointLabels<'_>) {
        let values = labels.values();
        metrics.info_head_block.with_label_values(&values).set(self.head);
        metrics.info_lib.with_label_values(&values).set(self.lib);
        metrics.info_head_lag.with_label_values(&values).set(self.head_lag);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetUpdate {
    pub connected: f64,
    pub disconnected: f64,
    pub syncing: f64,
    pub endpoint: String,
    pub url: String,
}

impl MetricUpdate for NetUpdate {
    const KIND: MetricKind = MetricKind::Net;
    endpoint_accessors!();

    fn record(&self, metrics: &ExporterMetrics, labels: &EndpointLabels<'_>) {
        let values = labels.values();
        metrics.net_connected_peers.with_label_values(&values).set(self.connected);
        metrics
            .net_disconnected_peers
            .with_label_values(&values)
            .set(self.disconnected);
        metrics.net_syncing_peers.with_label_values(&values).set(self.syncing);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PausedUpdate {
    /// Always 1: a paused producer yields no update at all.
    pub active: f64,
    pub endpoint: String,
    pub url: String,
}

impl MetricUpdate for PausedUpdate {
    const KIND: MetricKind = MetricKind::Paused;
    endpoint_accessors!();

    fn record(&self, metrics: &ExporterMetrics, labels: &EndpointLabels<'_>) {
        metrics
            .producer_producing
            .with_label_values(&labels.values())
            .set(self.active);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeUpdate {
    pub max_transaction_time: f64,
    pub endpoint: String,
    pub url: String,
}

impl MetricUpdate for RuntimeUpdate {
    const KIND: MetricKind = MetricKind::Runtime;
    endpoint_accessors!();

    fn record(&self, metrics: &ExporterMetrics, labels: &EndpointLabels<'_>) {
        metrics
            .runtime_max_transaction_time
            .with_label_values(&labels.values())
            .set(self.max_transaction_time);
    }
}

/// One ranked producer candidate as seen by one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerUpdate {
    pub active: f64,
    pub is_top21: f64,
    pub last_claim_delta: f64,
    pub rank: f64,
    pub votes: f64,
    pub producer: String,
    pub endpoint: String,
    pub url: String,
}

impl MetricUpdate for ProducerUpdate {
    const KIND: MetricKind = MetricKind::Producer;
    endpoint_accessors!();

    fn record(&self, metrics: &ExporterMetrics, labels: &EndpointLabels<'_>) {
        let values = labels.with_producer(&self.producer);
        metrics.producer_is_active.with_label_values(&values).set(self.active);
        metrics.producer_is_top21.with_label_values(&values).set(self.is_top21);
        metrics
            .producer_last_bpclaim_delta
            .with_label_values(&values)
            .set(self.last_claim_delta);
        metrics.producer_rank.with_label_values(&values).set(self.rank);
        metrics.producer_votes.with_label_values(&values).set(self.votes);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleUpdate {
    pub active: f64,
    pub pending: f64,
    pub proposed: f64,
    pub endpoint: String,
    pub url: String,
}

impl MetricUpdate for ScheduleUpdate {
    const KIND: MetricKind = MetricKind::Schedule;
    endpoint_accessors!();

    fn record(&self, metrics: &ExporterMetrics, labels: &EndpointLabels<'_>) {
        let values = labels.values();
        metrics
            .producer_schedule_active
            .with_label_values(&values)
            .set(self.active);
        metrics
            .producer_schedule_pending
            .with_label_values(&values)
            .set(self.pending);
        metrics
            .producer_schedule_proposed
            .with_label_values(&values)
            .set(self.proposed);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbUpdate {
    pub free: f64,
    pub used: f64,
    pub endpoint: String,
    pub url: String,
}

impl MetricUpdate for DbUpdate {
    const KIND: MetricKind = MetricKind::Db;
    endpoint_accessors!();

    fn record(&self, metrics: &ExporterMetrics, labels: &EndpointLabels<'_>) {
        let values = labels.values();
        metrics.db_free_bytes.with_label_values(&values).set(self.free);
        metrics.db_used_bytes.with_label_values(&values).set(self.used);
    }
}
