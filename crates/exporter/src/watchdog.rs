//! Staleness check over the live target set.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use tracing::error;

use crate::target::Target;

/// Targets whose last successful `get_info` is older than `now - threshold`.
/// A target that never succeeded counts as stale.
pub fn stale_targets<'a>(
    targets: &'a [Arc<Target>],
    now: DateTime<Utc>,
    threshold: Duration,
) -> Vec<&'a Arc<Target>> {
    let cutoff = now - threshold;
    targets
        .iter()
        .filter(|t| t.last().is_none_or(|last| last < cutoff))
        .collect()
}

/// Logs stale targets. Observability only: targets are never removed.
/// Clones share the report counter.
#[derive(Debug, Clone)]
pub struct Watchdog {
    threshold: Duration,
    reported: Arc<AtomicU64>,
}

impl Watchdog {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            reported: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Stale reports logged since creation.
    pub fn reports(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }

    /// Returns how many targets were reported.
    pub fn check(&self, targets: &[Arc<Target>]) -> usize {
        let stale = stale_targets(targets, Utc::now(), self.threshold);
        for target in &stale {
            match target.last() {
                Some(last) => error!(
                    endpoint = target.host(),
                    url = target.url(),
                    last_update = %last,
                    "endpoint has not updated in over {} seconds",
                    self.threshold.num_seconds()
                ),
                None => error!(
                    endpoint = target.host(),
                    url = target.url(),
                    "endpoint has never updated"
                ),
            }
        }
        self.reported.fetch_add(stale.len() as u64, Ordering::Relaxed);
        stale.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EndpointCache;
    use crate::rpc::mock::MockNode;

    fn target(url: &str) -> Arc<Target> {
        let node = Arc::new(MockNode::healthy(url));
        Arc::new(Target::new(node, Arc::new(EndpointCache::new())).expect("valid url"))
    }

    #[tokio::test]
    async fn test_fresh_target_not_stale() {
        let fresh = target("http://fresh:8888");
        fresh.fetch_info().await.expect("info");
        let never = target("http://never:8888");

        let targets = vec![fresh, never];
        let stale = stale_targets(&targets, Utc::now(), Duration::minutes(5));
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].host(), "never");
    }

    #[tokio::test]
    async fn test_old_target_is_stale() {
        let t = target("http://old:8888");
        t.fetch_info().await.expect("info");
        let targets = vec![t];

        let later = Utc::now() + Duration::minutes(6);
        assert_eq!(stale_targets(&targets, later, Duration::minutes(5)).len(), 1);
        assert_eq!(
            stale_targets(&targets, Utc::now(), Duration::minutes(5)).len(),
            0
        );
    }

    #[test]
    fn test_check_counts_and_keeps_targets() {
        let targets = vec![target("http://a:8888"), target("http://b:8888")];
        let watchdog = Watchdog::new(Duration::minutes(5));
        assert_eq!(watchdog.check(&targets), 2);
        assert_eq!(targets.len(), 2);
        assert_eq!(watchdog.clone().reports(), 2);
    }
}
