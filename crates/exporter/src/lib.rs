//! FIO node exporter
//!
//! Polls a fleet of FIO nodeos endpoints on a fixed interval and republishes
//! what they report as Prometheus gauges.
//!
//! - **Bootstrap**: connects to each configured url and probes which optional
//!   sub-APIs (producer, db_size, net) it exposes
//! - **Poller**: one collection task per endpoint per tick, fetching each
//!   metric kind in turn
//! - **Aggregators**: one single-writer consumer per metric kind, labelling
//!   samples from the shared endpoint cache
//! - **Watchdog**: reports endpoints that have stopped answering `get_info`
//!
//! # Architecture
//!
//! ```text
//!   bootstrap ──► Poller (targets) ── tick ──► collect_target × N
//!                                                   │
//!              ┌──────────┬──────────┬──────────────┼── ... ──┐
//!              ▼          ▼          ▼              ▼         ▼
//!           info agg   net agg   paused agg    producer agg  db agg
//!              │          │          │              │         │
//!              └──── EndpointCache lookup ──► GaugeVec ◄──────┘
//!                                                 │
//!                                          GET /metrics
//! ```
//!
//! # Usage
//!
//! ```bash
//! fio-exporter -u http://node-a:8888,http://node-b:8888 --namespace fio
//! ```

pub mod aggregator;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod error;
pub mod exporter;
pub mod metrics;
pub mod poller;
pub mod rpc;
pub mod server;
pub mod target;
pub mod update;
pub mod watchdog;

pub use bootstrap::BootstrapError;
pub use cache::{EndpointCache, EndpointInfo};
pub use config::{Cli, ExporterConfig};
pub use error::{Capability, CollectError, Disposition, RpcError};
pub use exporter::Exporter;
pub use metrics::ExporterMetrics;
pub use poller::{Poller, PollerConfig, UpdateSenders, collect_target, update_channels};
pub use rpc::{Connector, HttpConnector, HttpNodeApi, NodeApi};
pub use target::{Chain, Target};
