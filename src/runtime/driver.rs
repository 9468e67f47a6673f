//! # Driver
//!
//! Schedules reconciliation attempts for every registered kind.
//!
//! Attempts start on:
//! - a change seen by a kind's watch loop
//! - the requeue a successful attempt asked for (poll)
//! - exponential backoff after a failed attempt
//! - the periodic relist of every kind (the first one runs at startup)
//!
//! At most one attempt runs per record. A trigger that arrives while the
//! record's attempt is running is remembered and runs right after it. Across
//! records, attempts are bounded by a semaphore and their start rate by a
//! token bucket.
//!
//! On shutdown every running attempt is cancelled and drained before
//! [`Driver::run`] returns.

use super::error_policy::ErrorPolicy;
use super::rate_limit::TokenBucket;
use super::registry::Registry;
use super::watch_loop::{run_watch_loop, WatchSettings};
use crate::config::ControllerConfig;
use crate::controller::error::ReconcileError;
use crate::controller::reconciler::{AttemptContext, ReconcileOutcome, TriggerSource};
use crate::observability::metrics;
use crate::store::ObjectKey;
use futures::{FutureExt, StreamExt};
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::time::{delay_queue, DelayQueue};
use tracing::{debug, error, info, info_span, warn, Instrument};

const TRIGGER_BUFFER: usize = 1024;

/// Request to reconcile one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub kind: String,
    pub key: ObjectKey,
    pub source: TriggerSource,
}

/// Kind plus record key; the unit of serialization
type TaskId = (String, ObjectKey);

fn identity(id: &TaskId) -> String {
    format!("{}/{}", id.0, id.1)
}

/// Scheduling limits and intervals
#[derive(Debug, Clone, Copy)]
pub struct DriverSettings {
    pub max_concurrent: usize,
    pub max_reconcile_rate: u32,
    pub attempt_timeout: Duration,
    pub sync_interval: Duration,
    pub poll_interval: Duration,
    pub backoff_start: Duration,
    pub backoff_max: Duration,
    pub watch: WatchSettings,
}

impl DriverSettings {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent_reconciliations.max(1),
            max_reconcile_rate: config.max_reconcile_rate,
            attempt_timeout: config.attempt_timeout(),
            sync_interval: config.sync_interval(),
            poll_interval: config.poll_interval(),
            backoff_start: config.backoff_start_duration(),
            backoff_max: config.backoff_max_duration(),
            watch: WatchSettings {
                backoff_start_ms: config.backoff_start_ms,
                backoff_max_ms: config.backoff_max_ms,
                watch_restart_delay_secs: config.watch_restart_delay_secs,
                watch_restart_delay_after_end_secs: config.watch_restart_delay_after_end_secs,
            },
        }
    }
}

/// Result of one attempt; `None` when the attempt panicked
type Finished = (TaskId, Option<Result<ReconcileOutcome, ReconcileError>>, Duration);

pub struct Driver {
    registry: Registry,
    settings: DriverSettings,
    shutdown: CancellationToken,
    ready: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Driver {
    pub fn new(registry: Registry, settings: DriverSettings) -> Self {
        Self {
            registry,
            settings,
            shutdown: CancellationToken::new(),
            ready: None,
        }
    }

    /// Flag flipped to true while the driver runs, for the readiness probe
    #[must_use]
    pub fn with_readiness(mut self, ready: Arc<AtomicBool>) -> Self {
        self.ready = Some(ready);
        self
    }

    /// Cancelling the token stops the driver
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until the shutdown token is cancelled
    pub async fn run(self) {
        let (sender, receiver) = mpsc::channel(TRIGGER_BUFFER);
        let mut watchers = JoinSet::new();
        for controller in self.registry.kinds() {
            watchers.spawn(run_watch_loop(
                Arc::clone(controller),
                sender.clone(),
                self.settings.watch,
                self.shutdown.clone(),
            ));
        }
        if let Some(ready) = &self.ready {
            ready.store(true, Ordering::Relaxed);
        }
        info!(
            kinds = self.registry.len(),
            max_concurrent = self.settings.max_concurrent,
            "🚀 Driver started"
        );

        let mut scheduler = Scheduler::new(&self.registry, self.settings, self.shutdown.clone());
        scheduler.run(receiver).await;

        if let Some(ready) = &self.ready {
            ready.store(false, Ordering::Relaxed);
        }
        info!("Shutdown requested, waiting for in-flight reconciliations to complete...");
        scheduler.drain().await;
        drop(sender);
        while watchers.join_next().await.is_some() {}
        info!("Driver stopped gracefully");
    }
}

/// State owned by the driver task
struct Scheduler<'a> {
    registry: &'a Registry,
    settings: DriverSettings,
    shutdown: CancellationToken,
    queue: VecDeque<(TaskId, TriggerSource)>,
    queued: HashSet<TaskId>,
    /// Running records and the trigger that arrived meanwhile, if any
    running: HashMap<TaskId, Option<TriggerSource>>,
    delayed: DelayQueue<(TaskId, TriggerSource)>,
    delay_keys: HashMap<TaskId, delay_queue::Key>,
    permits: Arc<Semaphore>,
    bucket: TokenBucket,
    rate_wait: Option<Instant>,
    policy: ErrorPolicy,
    tasks: JoinSet<Finished>,
}

impl<'a> Scheduler<'a> {
    fn new(registry: &'a Registry, settings: DriverSettings, shutdown: CancellationToken) -> Self {
        Self {
            registry,
            settings,
            shutdown,
            queue: VecDeque::new(),
            queued: HashSet::new(),
            running: HashMap::new(),
            delayed: DelayQueue::new(),
            delay_keys: HashMap::new(),
            permits: Arc::new(Semaphore::new(settings.max_concurrent)),
            bucket: TokenBucket::per_second(settings.max_reconcile_rate),
            rate_wait: None,
            policy: ErrorPolicy::new(
                settings.backoff_start,
                settings.backoff_max,
                settings.poll_interval,
            ),
            tasks: JoinSet::new(),
        }
    }

    async fn run(&mut self, mut triggers: mpsc::Receiver<Trigger>) {
        let mut sync = tokio::time::interval(self.settings.sync_interval);
        sync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            self.dispatch();
            let rate_wait = self.rate_wait;
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                Some(trigger) = triggers.recv() => {
                    if self.registry.get(&trigger.kind).is_none() {
                        warn!(kind = %trigger.kind, "Trigger for unregistered kind");
                        continue;
                    }
                    self.enqueue((trigger.kind, trigger.key), trigger.source);
                }
                Some(expired) = self.delayed.next(), if !self.delayed.is_empty() => {
                    let (id, source) = expired.into_inner();
                    self.delay_keys.remove(&id);
                    self.enqueue(id, source);
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    match joined {
                        Ok(finished) => self.complete(finished),
                        Err(e) => error!("Reconciliation task failed to join: {}", e),
                    }
                }
                _ = sync.tick() => self.relist().await,
                () = sleep_until(rate_wait), if rate_wait.is_some() => {
                    self.rate_wait = None;
                }
            }
        }
    }

    /// Queue `id` to run as soon as a slot is free
    fn enqueue(&mut self, id: TaskId, source: TriggerSource) {
        if let Some(pending) = self.running.get_mut(&id) {
            if pending.is_none() {
                debug!(resource = %identity(&id), "Attempt running; deferring trigger");
                *pending = Some(source);
            }
            return;
        }
        if self.queued.contains(&id) {
            return;
        }
        if let Some(key) = self.delay_keys.remove(&id) {
            self.delayed.remove(&key);
        }
        self.queued.insert(id.clone());
        self.queue.push_back((id, source));
    }

    /// Queue `id` after `delay`, unless an earlier run is already scheduled
    fn schedule_after(&mut self, id: TaskId, source: TriggerSource, delay: Duration) {
        match self.delay_keys.get(&id) {
            Some(key) => {
                if self.delayed.deadline(key) > Instant::now() + delay {
                    self.delayed.reset(key, delay);
                }
            }
            None => {
                let key = self.delayed.insert((id.clone(), source), delay);
                self.delay_keys.insert(id, key);
            }
        }
    }

    /// Start queued attempts while slots and tokens last
    fn dispatch(&mut self) {
        if self.rate_wait.is_some() {
            return;
        }
        while !self.queue.is_empty() {
            let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                return;
            };
            if let Err(wait) = self.bucket.try_acquire() {
                metrics::increment_rate_limited();
                self.rate_wait = Some(Instant::now() + wait);
                return;
            }
            let Some((id, source)) = self.queue.pop_front() else {
                return;
            };
            self.queued.remove(&id);
            let Some(controller) = self.registry.get(&id.0).map(Arc::clone) else {
                continue;
            };

            let attempt = AttemptContext {
                trigger: source,
                cancel: self.shutdown.child_token(),
                timeout: self.settings.attempt_timeout,
                retries: self.policy.retries(&identity(&id)),
            };
            let span = info_span!(
                "controller.reconcile",
                resource.kind = id.0.as_str(),
                resource.name = id.1.name.as_str(),
                resource.namespace = id.1.namespace.as_deref().unwrap_or(""),
                trigger = source.as_str()
            );
            self.running.insert(id.clone(), None);
            self.tasks.spawn(
                async move {
                    let _permit = permit;
                    let start = std::time::Instant::now();
                    let result = AssertUnwindSafe(controller.reconcile(&id.1, attempt))
                        .catch_unwind()
                        .await
                        .ok();
                    (id, result, start.elapsed())
                }
                .instrument(span),
            );
            metrics::set_reconciliations_in_flight(i64::try_from(self.running.len()).unwrap_or(i64::MAX));
        }
    }

    fn complete(&mut self, (id, result, elapsed): Finished) {
        let pending = self.running.remove(&id).flatten();
        metrics::set_reconciliations_in_flight(i64::try_from(self.running.len()).unwrap_or(i64::MAX));
        metrics::observe_reconciliation_duration(&id.0, elapsed.as_secs_f64());
        let name = identity(&id);

        let next = match result {
            Some(Ok(outcome)) => {
                metrics::increment_reconciliations(&id.0, "success");
                self.policy.reset(&name);
                match outcome {
                    ReconcileOutcome::RequeueAfter(delay) => {
                        metrics::increment_requeues_total(TriggerSource::Poll.as_str());
                        Some((TriggerSource::Poll, delay))
                    }
                    ReconcileOutcome::Done => None,
                }
            }
            Some(Err(ReconcileError::Cancelled)) => {
                debug!(resource = %name, "Attempt cancelled");
                None
            }
            Some(Err(e)) => {
                metrics::increment_reconciliations(&id.0, "error");
                let delay = self.policy.handle_reconciliation_error(&id.0, &name, &e);
                Some((TriggerSource::ErrorBackoff, delay))
            }
            None => {
                error!(resource = %name, "Reconciliation attempt panicked");
                metrics::increment_reconciliations(&id.0, "error");
                Some((TriggerSource::ErrorBackoff, self.settings.backoff_max))
            }
        };

        if self.shutdown.is_cancelled() {
            return;
        }
        if let Some(source) = pending {
            debug!(resource = %name, deferred = source.as_str(), "Running deferred trigger");
            self.enqueue(id, TriggerSource::Pending);
        } else if let Some((source, delay)) = next {
            self.schedule_after(id, source, delay);
        }
    }

    /// Queue every record of every kind
    async fn relist(&mut self) {
        let registry = self.registry;
        for controller in registry.kinds() {
            match controller.keys().await {
                Ok(keys) => {
                    debug!(kind = controller.kind(), records = keys.len(), "Periodic sync");
                    for key in keys {
                        self.enqueue(
                            (controller.kind().to_string(), key),
                            TriggerSource::PeriodicSync,
                        );
                    }
                }
                Err(e) => warn!(kind = controller.kind(), error = %e, "Failed to list records for sync"),
            }
        }
    }

    /// Wait for running attempts; they observe the cancelled token
    async fn drain(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(finished) => self.complete(finished),
                Err(e) => error!("Reconciliation task failed to join: {}", e),
            }
        }
        metrics::set_reconciliations_in_flight(0);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
