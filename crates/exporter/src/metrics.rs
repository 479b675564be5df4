//! Gauge families published on `/metrics`.
//!
//! Every family lives in one [`Registry`] owned by [`ExporterMetrics`].
//! Each metric kind writes a disjoint set of families, so aggregators never
//! contend on the same gauge vector.

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

/// Labels carried by every sample.
pub const STD_LABELS: &[&str] = &["chain_id", "version", "endpoint"];

/// Labels carried by per-producer samples.
pub const PRODUCER_LABELS: &[&str] = &["chain_id", "version", "endpoint", "producer"];

/// Endpoint-scoped label values resolved at aggregation time.
#[derive(Debug, Clone, Copy)]
pub struct EndpointLabels<'a> {
    pub chain_id: &'a str,
    pub version: &'a str,
    pub endpoint: &'a str,
}

impl<'a> EndpointLabels<'a> {
    pub fn values(&self) -> [&'a str; 3] {
        [self.chain_id, self.version, self.endpoint]
    }

    pub fn with_producer(&self, producer: &'a str) -> [&'a str; 4] {
        [self.chain_id, self.version, self.endpoint, producer]
    }
}

/// All gauge families exported by the poller.
pub struct ExporterMetrics {
    registry: Registry,

    // chain/get_info
    pub info_head_block: GaugeVec,
    pub info_lib: GaugeVec,
    pub info_head_lag: GaugeVec,

    // net/connections
    pub net_connected_peers: GaugeVec,
    pub net_disconnected_peers: GaugeVec,
    pub net_syncing_peers: GaugeVec,

    // producer/paused
    pub producer_producing: GaugeVec,

    // producer/get_runtime_options
    pub runtime_max_transaction_time: GaugeVec,

    // chain/get_producers
    pub producer_is_active: GaugeVec,
    pub producer_is_top21: GaugeVec,
    pub producer_last_bpclaim_delta: GaugeVec,
    pub producer_rank: GaugeVec,
    pub producer_votes: GaugeVec,

    // chain/get_producer_schedule
    pub producer_schedule_active: GaugeVec,
    pub producer_schedule_pending: GaugeVec,
    pub producer_schedule_proposed: GaugeVec,

    // db_size/get
    pub db_free_bytes: GaugeVec,
    pub db_used_bytes: GaugeVec,
}

impl ExporterMetrics {
    /// Create and register every family. A non-empty `namespace` is
    /// prepended to each name as `<namespace>_<name>`.
    pub fn new(namespace: Option<&str>) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let ns = namespace.unwrap_or_default();
        let gauge = |name: &str, help: &str, labels: &[&str]| -> Result<GaugeVec, prometheus::Error> {
            let mut opts = Opts::new(name, help);
            if !ns.is_empty() {
                opts = opts.namespace(ns);
            }
            let vec = GaugeVec::new(opts, labels)?;
            registry.register(Box::new(vec.clone()))?;
            Ok(vec)
        };

        Ok(Self {
            info_head_block: gauge(
                "info_head_block",
                "head block number from get_info endpoint",
                STD_LABELS,
            )?,
            info_lib: gauge(
                "info_lib",
                "last irreversible block number from get_info endpoint",
                STD_LABELS,
            )?,
            info_head_lag: gauge("info_head_lag", "seconds behind the head block", STD_LABELS)?,

            net_connected_peers: gauge(
                "net_connected_peers",
                "number of connected peers",
                STD_LABELS,
            )?,
            net_disconnected_peers: gauge(
                "net_disconnected_peers",
                "number of unreachable peers",
                STD_LABELS,
            )?,
            net_syncing_peers: gauge(
                "net_syncing_peers",
                "number of peers catching up",
                STD_LABELS,
            )?,

            producer_producing: gauge(
                "producer_producing",
                "1 when the producer api reports it is actively signing blocks, absent when paused",
                STD_LABELS,
            )?,

            runtime_max_transaction_time: gauge(
                "runtime_max_transaction_time",
                "maximum transaction time (producer runtime options)",
                STD_LABELS,
            )?,

            producer_is_active: gauge(
                "producer_is_active",
                "whether producer is set to active",
                PRODUCER_LABELS,
            )?,
            producer_is_top21: gauge(
                "producer_is_top21",
                "whether producer is in the top 21: 0 if false",
                PRODUCER_LABELS,
            )?,
            producer_last_bpclaim_delta: gauge(
                "producer_last_bpclaim_delta",
                "seconds since last bpclaim",
                PRODUCER_LABELS,
            )?,
            producer_rank: gauge("producer_rank", "producer rank", PRODUCER_LABELS)?,
            producer_votes: gauge("producer_votes", "producer votes in FIO", PRODUCER_LABELS)?,

            producer_schedule_active: gauge(
                "producer_schedule_active",
                "active producer schedule",
                STD_LABELS,
            )?,
            producer_schedule_pending: gauge(
                "producer_schedule_pending",
                "pending producer schedule",
                STD_LABELS,
            )?,
            producer_schedule_proposed: gauge(
                "producer_schedule_proposed",
                "proposed producer schedule",
                STD_LABELS,
            )?,

            db_free_bytes: gauge("db_free_bytes", "bytes remaining for memory state", STD_LABELS)?,
            db_used_bytes: gauge("db_used_bytes", "bytes used by memory state", STD_LABELS)?,

            registry,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn encode_text(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_families_registered_without_namespace() {
        let metrics = ExporterMetrics::new(None).expect("register");
        let labels = EndpointLabels {
            chain_id: "mainnet",
            version: "v1",
            endpoint: "node-a",
        };
        metrics.info_head_block.with_label_values(&labels.values()).set(42.0);

        let families = metrics.registry().gather();
        let names: Vec<_> = families.iter().map(|f| f.get_name().to_string()).collect();
        assert!(names.contains(&"info_head_block".to_string()));
    }

    #[test]
    fn test_namespace_prefix() {
        let metrics = ExporterMetrics::new(Some("fio")).expect("register");
        let labels = EndpointLabels {
            chain_id: "testnet",
            version: "v1",
            endpoint: "node-a",
        };
        metrics
            .producer_rank
            .with_label_values(&labels.with_producer("bp@dapixdev"))
            .set(1.0);

        let text = metrics.encode_text().expect("encode");
        assert!(text.contains("fio_producer_rank{"));
        assert!(text.contains("producer=\"bp@dapixdev\""));
    }

    #[test]
    fn test_label_arity() {
        let metrics = ExporterMetrics::new(None).expect("register");
        // Producer families reject the three-label set.
        assert!(
            metrics
                .producer_votes
                .get_metric_with_label_values(&["a", "b", "c"])
                .is_err()
        );
        assert!(
            metrics
                .db_used_bytes
                .get_metric_with_label_values(&["a", "b", "c"])
                .is_ok()
        );
    }
}
