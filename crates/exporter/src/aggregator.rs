//! Single-writer consumers, one per metric kind.
//!
//! Each aggregator drains its own update channel, resolves the endpoint's
//! chain id and version from the [`EndpointCache`] and writes the sample to
//! the gauge families owned by that kind.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::EndpointCache;
use crate::metrics::{EndpointLabels, ExporterMetrics};
use crate::update::MetricUpdate;

/// Write one update. Returns false when the endpoint has no cache entry and
/// the update was dropped.
pub fn apply<U: MetricUpdate>(update: &U, cache: &EndpointCache, metrics: &ExporterMetrics) -> bool {
    let Some(info) = cache.get(update.url()) else {
        warn!(
            kind = %U::KIND,
            endpoint = update.endpoint(),
            url = update.url(),
            "no cached chain metadata, dropping update"
        );
        return false;
    };

    let labels = EndpointLabels {
        chain_id: &info.chain_id,
        version: &info.version,
        endpoint: update.endpoint(),
    };
    update.record(metrics, &labels);
    true
}

/// Drain `rx` until cancelled or every sender is gone.
pub async fn run_aggregator<U: MetricUpdate>(
    mut rx: mpsc::Receiver<U>,
    cache: Arc<EndpointCache>,
    metrics: Arc<ExporterMetrics>,
    cancel: CancellationToken,
) {
    debug!(kind = %U::KIND, "aggregator started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(kind = %U::KIND, "aggregator shutting down");
                break;
            }
            update = rx.recv() => match update {
                Some(update) => {
                    apply(&update, &cache, &metrics);
                }
                None => {
                    debug!(kind = %U::KIND, "all senders dropped, aggregator exiting");
                    break;
                }
            },
        }
    }
}
