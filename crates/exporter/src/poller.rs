//! Fixed-interval scan loop.
//!
//! Each collection tick spawns one task per target. A task fetches every
//! metric kind in order and routes each result to the aggregator channel for
//! that kind. The same loop also drives the staleness watchdog and the
//! endpoint cache scrub.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregator::run_aggregator;
use crate::cache::EndpointCache;
use crate::error::{CollectError, Disposition};
use crate::metrics::ExporterMetrics;
use crate::target::Target;
use crate::update::{
    DbUpdate, InfoUpdate, MetricKind, MetricUpdate, NetUpdate, PausedUpdate, ProducerUpdate,
    RuntimeUpdate, ScheduleUpdate,
};
use crate::watchdog::Watchdog;

/// Default capacity of each aggregator channel.
pub const UPDATE_CHANNEL_CAPACITY: usize = 1024;

/// Shortest period any of the poller's timers may run at.
const MIN_TICK: Duration = Duration::from_secs(1);

/// Timing and admission settings for [`Poller`].
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub watchdog_interval: Duration,
    pub stale_after: Duration,
    pub scrub_interval: Duration,
    /// Cap on collection tasks running at once. `None` is unbounded.
    pub max_concurrent_collections: Option<usize>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            watchdog_interval: Duration::from_secs(5 * 60),
            stale_after: Duration::from_secs(5 * 60),
            scrub_interval: Duration::from_secs(60),
            max_concurrent_collections: None,
        }
    }
}

/// Sending half of every aggregator channel.
#[derive(Clone)]
pub struct UpdateSenders {
    pub info: mpsc::Sender<InfoUpdate>,
    pub net: mpsc::Sender<NetUpdate>,
    pub paused: mpsc::Sender<PausedUpdate>,
    pub runtime: mpsc::Sender<RuntimeUpdate>,
    pub producer: mpsc::Sender<ProducerUpdate>,
    pub schedule: mpsc::Sender<ScheduleUpdate>,
    pub db: mpsc::Sender<DbUpdate>,
}

/// Receiving half of every aggregator channel.
pub struct UpdateReceivers {
    info: mpsc::Receiver<InfoUpdate>,
    net: mpsc::Receiver<NetUpdate>,
    paused: mpsc::Receiver<PausedUpdate>,
    runtime: mpsc::Receiver<RuntimeUpdate>,
    producer: mpsc::Receiver<ProducerUpdate>,
    schedule: mpsc::Receiver<ScheduleUpdate>,
    db: mpsc::Receiver<DbUpdate>,
}

/// One bounded channel per metric kind.
pub fn update_channels(capacity: usize) -> (UpdateSenders, UpdateReceivers) {
    let capacity = capacity.max(1);
    let (info_tx, info) = mpsc::channel(capacity);
    let (net_tx, net) = mpsc::channel(capacity);
    let (paused_tx, paused) = mpsc::channel(capacity);
    let (runtime_tx, runtime) = mpsc::channel(capacity);
    let (producer_tx, producer) = mpsc::channel(capacity);
    let (schedule_tx, schedule) = mpsc::channel(capacity);
    let (db_tx, db) = mpsc::channel(capacity);

    (
        UpdateSenders {
            info: info_tx,
            net: net_tx,
            paused: paused_tx,
            runtime: runtime_tx,
            producer: producer_tx,
            schedule: schedule_tx,
            db: db_tx,
        },
        UpdateReceivers {
            info,
            net,
            paused,
            runtime,
            producer,
            schedule,
            db,
        },
    )
}

impl UpdateReceivers {
    /// Spawn one aggregator per metric kind.
    pub fn spawn_aggregators(
        self,
        cache: Arc<EndpointCache>,
        metrics: Arc<ExporterMetrics>,
        cancel: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        fn spawn<U: MetricUpdate>(
            rx: mpsc::Receiver<U>,
            cache: &Arc<EndpointCache>,
            metrics: &Arc<ExporterMetrics>,
            cancel: &CancellationToken,
        ) -> JoinHandle<()> {
            tokio::spawn(run_aggregator(
                rx,
                cache.clone(),
                metrics.clone(),
                cancel.clone(),
            ))
        }

        vec![
            spawn(self.info, &cache, &metrics, &cancel),
            spawn(self.net, &cache, &metrics, &cancel),
            spawn(self.paused, &cache, &metrics, &cancel),
            spawn(self.runtime, &cache, &metrics, &cancel),
            spawn(self.producer, &cache, &metrics, &cancel),
            spawn(self.schedule, &cache, &metrics, &cancel),
            spawn(self.db, &cache, &metrics, &cancel),
        ]
    }
}

/// Aggregator for this kind has shut down.
struct Closed;

fn skip(target: &Target, kind: MetricKind, err: &CollectError) {
    match err.disposition() {
        Disposition::Silent => {
            debug!(endpoint = target.host(), kind = %kind, reason = %err, "skipping metric kind")
        }
        Disposition::Logged => {
            warn!(endpoint = target.host(), url = target.url(), kind = %kind, error = %err, "collection failed")
        }
    }
}

async fn deliver<U: MetricUpdate>(
    target: &Target,
    tx: &mpsc::Sender<U>,
    result: Result<U, CollectError>,
) -> Result<(), Closed> {
    match result {
        Ok(update) => tx.send(update).await.map_err(|_| Closed),
        Err(e) => {
            skip(target, U::KIND, &e);
            Ok(())
        }
    }
}

async fn deliver_producers(
    target: &Target,
    tx: &mpsc::Sender<ProducerUpdate>,
    result: Result<Vec<ProducerUpdate>, CollectError>,
) -> Result<(), Closed> {
    match result {
        Ok(updates) => {
            for update in updates {
                tx.send(update).await.map_err(|_| Closed)?;
            }
            Ok(())
        }
        Err(e) => {
            skip(target, MetricKind::Producer, &e);
            Ok(())
        }
    }
}

async fn collect_kinds(target: &Target, tx: &UpdateSenders) -> Result<(), Closed> {
    let info = match target.fetch_info().await {
        Ok(info) => info,
        Err(e) => {
            warn!(endpoint = target.host(), url = target.url(), error = %e, "get_info failed, skipping tick");
            return Ok(());
        }
    };
    tx.info.send(info).await.map_err(|_| Closed)?;

    deliver(target, &tx.net, target.fetch_net().await).await?;
    deliver(target, &tx.paused, target.fetch_paused().await).await?;
    deliver(target, &tx.runtime, target.fetch_runtime().await).await?;
    deliver_producers(target, &tx.producer, target.fetch_producers().await).await?;
    deliver(target, &tx.schedule, target.fetch_schedule().await).await?;
    deliver(target, &tx.db, target.fetch_db().await).await
}

/// Collect every metric kind for one target, strictly in order.
pub async fn collect_target(target: &Target, tx: &UpdateSenders) {
    if collect_kinds(target, tx).await.is_err() {
        debug!(endpoint = target.host(), "aggregator closed, abandoning collection");
    }
}

pub struct Poller {
    config: PollerConfig,
    targets: Vec<Arc<Target>>,
    senders: UpdateSenders,
    cache: Arc<EndpointCache>,
    watchdog: Watchdog,
    limiter: Option<Arc<Semaphore>>,
}

impl Poller {
    pub fn new(
        config: PollerConfig,
        targets: Vec<Arc<Target>>,
        senders: UpdateSenders,
        cache: Arc<EndpointCache>,
    ) -> Self {
        let config = PollerConfig {
            poll_interval: config.poll_interval.max(MIN_TICK),
            watchdog_interval: config.watchdog_interval.max(MIN_TICK),
            scrub_interval: config.scrub_interval.max(MIN_TICK),
            ..config
        };
        let stale_after = chrono::Duration::from_std(config.stale_after)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let limiter = config
            .max_concurrent_collections
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));

        Self {
            config,
            targets,
            senders,
            cache,
            watchdog: Watchdog::new(stale_after),
            limiter,
        }
    }

    pub fn targets(&self) -> &[Arc<Target>] {
        &self.targets
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Handle sharing the report counter of the watchdog driven by [`Poller::run`].
    pub fn watchdog(&self) -> Watchdog {
        self.watchdog.clone()
    }

    /// Spawn one collection task per target. Tasks are detached; the handles
    /// are returned for callers that want to wait on a single tick.
    pub fn collect_once(&self) -> Vec<JoinHandle<()>> {
        self.targets
            .iter()
            .map(|target| {
                let target = target.clone();
                let senders = self.senders.clone();
                let limiter = self.limiter.clone();
                tokio::spawn(async move {
                    let _permit = match limiter {
                        Some(sem) => match sem.acquire_owned().await {
                            Ok(permit) => Some(permit),
                            Err(_) => return,
                        },
                        None => None,
                    };
                    collect_target(&target, &senders).await;
                })
            })
            .collect()
    }

    /// Run until `cancel` fires. In-flight collection tasks are left to finish.
    pub async fn run(self, cancel: CancellationToken) {
        let mut collect_tick = interval(self.config.poll_interval);
        collect_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let watchdog_period = self.config.watchdog_interval;
        let mut watchdog_tick = interval_at(Instant::now() + watchdog_period, watchdog_period);
        watchdog_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let scrub_period = self.config.scrub_interval;
        let mut scrub_tick = interval_at(Instant::now() + scrub_period, scrub_period);
        scrub_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            targets = self.targets.len(),
            interval_secs = self.config.poll_interval.as_secs(),
            "poller started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("poller shutting down");
                    break;
                }
                _ = collect_tick.tick() => {
                    debug!(targets = self.targets.len(), "collection tick");
                    self.collect_once();
                }
                _ = watchdog_tick.tick() => {
                    self.watchdog.check(&self.targets);
                }
                _ = scrub_tick.tick() => {
                    let removed = self.cache.scrub();
                    if removed > 0 {
                        debug!(removed, "scrubbed endpoint cache");
                    }
                }
            }
        }
    }
}
