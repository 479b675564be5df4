//! Top-level context wiring bootstrap, aggregators, poller and server.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::bootstrap::{BootstrapError, bootstrap};
use crate::cache::EndpointCache;
use crate::config::ExporterConfig;
use crate::metrics::ExporterMetrics;
use crate::poller::{Poller, PollerConfig, UPDATE_CHANNEL_CAPACITY, update_channels};
use crate::rpc::Connector;
use crate::server;
use crate::target::Target;

/// Everything the running exporter shares, owned in one place.
pub struct Exporter {
    config: ExporterConfig,
    metrics: Arc<ExporterMetrics>,
    cache: Arc<EndpointCache>,
    targets: Vec<Arc<Target>>,
    cancel: CancellationToken,
}

impl Exporter {
    pub fn new(config: ExporterConfig) -> Result<Self, prometheus::Error> {
        let metrics = ExporterMetrics::new(config.namespace.as_deref())?;
        Ok(Self {
            config,
            metrics: Arc::new(metrics),
            cache: Arc::new(EndpointCache::new()),
            targets: Vec::new(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn metrics(&self) -> &Arc<ExporterMetrics> {
        &self.metrics
    }

    pub fn targets(&self) -> &[Arc<Target>] {
        &self.targets
    }

    /// Token that stops every task started by [`Exporter::run`].
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Connect to and probe the configured endpoints.
    pub async fn connect(&mut self, connector: &dyn Connector) -> Result<usize, BootstrapError> {
        self.targets = bootstrap(&self.config, self.cache.clone(), connector).await?;
        Ok(self.targets.len())
    }

    /// Serve metrics and poll until cancelled, then wait for the aggregators
    /// and server to wind down.
    pub async fn run(self) -> Result<()> {
        let (addr, server) =
            server::start(self.config.listen, self.metrics.clone(), self.cancel.clone()).await?;
        info!(addr = %addr, targets = self.targets.len(), "exporter running");

        let (senders, receivers) = update_channels(UPDATE_CHANNEL_CAPACITY);
        let aggregators =
            receivers.spawn_aggregators(self.cache.clone(), self.metrics.clone(), self.cancel.clone());

        let poller_config = PollerConfig {
            poll_interval: self.config.poll_interval,
            watchdog_interval: self.config.watchdog_interval,
            stale_after: self.config.stale_after,
            max_concurrent_collections: self.config.max_concurrent_collections,
            ..PollerConfig::default()
        };
        let poller = Poller::new(poller_config, self.targets, senders, self.cache);
        poller.run(self.cancel.clone()).await;

        for handle in aggregators {
            let _ = handle.await;
        }
        let _ = server.await;

        info!("exporter stopped");
        Ok(())
    }
}
