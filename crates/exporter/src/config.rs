//! Command-line configuration, read once at startup.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;

use crate::error::Capability;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "fio-exporter",
    about = "Prometheus exporter for a fleet of FIO nodeos endpoints",
    version
)]
pub struct Cli {
    /// Comma-separated list of nodeos API urls to monitor
    #[arg(short, long, default_value = "http://localhost:8888")]
    pub urls: String,

    /// Do not query the producer api
    #[arg(long)]
    pub no_producer: bool,

    /// Do not query the db_size api
    #[arg(long)]
    pub no_db: bool,

    /// Do not query the net api
    #[arg(long)]
    pub no_net: bool,

    /// Port to serve /metrics on
    #[arg(short, long, default_value_t = 13856)]
    pub port: u16,

    /// Prefix for every metric name, e.g. "fio"
    #[arg(long)]
    pub namespace: Option<String>,

    /// Seconds between collection ticks
    #[arg(long, default_value_t = 10)]
    pub poll_interval_secs: u64,

    /// Seconds between staleness checks
    #[arg(long, default_value_t = 300)]
    pub watchdog_interval_secs: u64,

    /// An endpoint without a successful get_info for this long is reported
    #[arg(long, default_value_t = 300)]
    pub stale_after_secs: u64,

    /// Per-request timeout for node RPC calls
    #[arg(long, default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// Cap on collection tasks running at once (unbounded when unset)
    #[arg(long)]
    pub max_concurrent_collections: Option<usize>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Endpoint urls with whitespace trimmed and empty entries dropped.
    pub fn endpoints(&self) -> Vec<String> {
        self.urls
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Resolved exporter settings.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub endpoints: Vec<String>,
    pub monitor_producer: bool,
    pub monitor_db: bool,
    pub monitor_net: bool,
    pub listen: SocketAddr,
    pub namespace: Option<String>,
    pub poll_interval: Duration,
    pub watchdog_interval: Duration,
    pub stale_after: Duration,
    pub request_timeout: Duration,
    pub max_concurrent_collections: Option<usize>,
}

impl ExporterConfig {
    /// Whether bootstrap should probe `capability`.
    pub fn monitors(&self, capability: Capability) -> bool {
        match capability {
            Capability::Producer => self.monitor_producer,
            Capability::Db => self.monitor_db,
            Capability::Net => self.monitor_net,
        }
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            endpoints: vec!["http://localhost:8888".to_string()],
            monitor_producer: true,
            monitor_db: true,
            monitor_net: true,
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 13856)),
            namespace: None,
            poll_interval: Duration::from_secs(10),
            watchdog_interval: Duration::from_secs(5 * 60),
            stale_after: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(10),
            max_concurrent_collections: None,
        }
    }
}

impl From<&Cli> for ExporterConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            endpoints: cli.endpoints(),
            monitor_producer: !cli.no_producer,
            monitor_db: !cli.no_db,
            monitor_net: !cli.no_net,
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, cli.port)),
            namespace: cli.namespace.clone().filter(|ns| !ns.is_empty()),
            poll_interval: Duration::from_secs(cli.poll_interval_secs.max(1)),
            watchdog_interval: Duration::from_secs(cli.watchdog_interval_secs.max(1)),
            stale_after: Duration::from_secs(cli.stale_after_secs),
            request_timeout: Duration::from_secs(cli.request_timeout_secs),
            max_concurrent_collections: cli.max_concurrent_collections.filter(|n| *n > 0),
        }
    }
}
