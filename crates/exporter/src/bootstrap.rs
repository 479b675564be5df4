//! Builds the live target set from the configured endpoints.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::cache::EndpointCache;
use crate::config::ExporterConfig;
use crate::error::Capability;
use crate::rpc::Connector;
use crate::target::Target;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("no endpoints could be reached")]
    NoTargets,
}

/// Connect to every configured url and probe the capabilities that are not
/// opted out. Unreachable urls are logged and skipped.
pub async fn bootstrap(
    config: &ExporterConfig,
    cache: Arc<EndpointCache>,
    connector: &dyn Connector,
) -> Result<Vec<Arc<Target>>, BootstrapError> {
    let mut targets = Vec::with_capacity(config.endpoints.len());

    for url in &config.endpoints {
        let mut target = match Target::connect(connector, url, cache.clone()).await {
            Ok(target) => target,
            Err(e) => {
                warn!(url = %url, error = %e, "could not connect to endpoint, skipping");
                continue;
            }
        };

        for &capability in Capability::all() {
            if config.monitors(capability) {
                target.probe(capability).await;
            }
        }

        info!(
            endpoint = target.host(),
            url = target.url(),
            producer = target.has(Capability::Producer),
            db = target.has(Capability::Db),
            net = target.has(Capability::Net),
            "monitoring endpoint"
        );
        targets.push(Arc::new(target));
    }

    if targets.is_empty() {
        return Err(BootstrapError::NoTargets);
    }
    Ok(targets)
}
