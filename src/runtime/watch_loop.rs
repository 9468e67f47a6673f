//! # Watch Loop
//!
//! One task per registered kind. It follows the kind's change stream and
//! forwards a trigger to the driver whenever a record's desired state
//! changed. The stream is restarted after errors and after it ends.

use super::driver::Trigger;
use super::error_policy::handle_watch_stream_error;
use super::registry::{Fingerprint, KindController};
use crate::controller::reconciler::TriggerSource;
use crate::observability::metrics;
use crate::store::ObjectKey;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// Restart and backoff settings of a watch loop
#[derive(Debug, Clone, Copy)]
pub struct WatchSettings {
    pub backoff_start_ms: u64,
    pub backoff_max_ms: u64,
    pub watch_restart_delay_secs: u64,
    pub watch_restart_delay_after_end_secs: u64,
}

/// Remembers the last fingerprint per record so unchanged events are dropped
///
/// Entries are dropped when the record's removal is seen.
#[derive(Debug, Default)]
pub struct ChangeFilter {
    seen: HashMap<ObjectKey, Fingerprint>,
}

impl ChangeFilter {
    /// Whether an event for `key` should trigger an attempt
    pub fn changed(&mut self, key: &ObjectKey, fingerprint: Option<Fingerprint>) -> bool {
        let Some(fingerprint) = fingerprint else {
            return true;
        };
        if fingerprint.is_removal() {
            self.seen.remove(key);
            return true;
        }
        if self.seen.get(key) == Some(&fingerprint) {
            return false;
        }
        self.seen.insert(key.clone(), fingerprint);
        true
    }
}

/// Run the watch loop of one kind until `shutdown` is cancelled
pub async fn run_watch_loop(
    controller: Arc<dyn KindController>,
    triggers: mpsc::Sender<Trigger>,
    settings: WatchSettings,
    shutdown: CancellationToken,
) {
    let kind = controller.kind().to_string();
    let backoff_duration_ms = Arc::new(AtomicU64::new(settings.backoff_start_ms));
    let mut filter = ChangeFilter::default();
    info!("Starting watch loop for {}...", kind);

    loop {
        if shutdown.is_cancelled() {
            break;
        }
        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            resource.kind = kind.as_str()
        );

        let restart = async {
            let mut stream = controller.watch();
            loop {
                let event = tokio::select! {
                    () = shutdown.cancelled() => return false,
                    event = stream.next() => event,
                };
                match event {
                    None => return true,
                    Some(Ok(observed)) => {
                        backoff_duration_ms.store(settings.backoff_start_ms, Ordering::Relaxed);
                        if !filter.changed(&observed.key, observed.fingerprint) {
                            continue;
                        }
                        debug!(resource = %observed.key, "watch.event.received");
                        let trigger = Trigger {
                            kind: kind.clone(),
                            key: observed.key,
                            source: TriggerSource::Change,
                        };
                        if triggers.send(trigger).await.is_err() {
                            // Driver is gone
                            return false;
                        }
                    }
                    Some(Err(e)) => {
                        let error_string = e.to_string();
                        if handle_watch_stream_error(
                            &kind,
                            &error_string,
                            &backoff_duration_ms,
                            settings.backoff_max_ms,
                            settings.watch_restart_delay_secs,
                        )
                        .await
                        .is_none()
                        {
                            metrics::increment_watch_restarts(&kind);
                            return true;
                        }
                    }
                }
            }
        }
        .instrument(watch_span)
        .await;

        if !restart || shutdown.is_cancelled() {
            break;
        }

        let delay_secs = settings.watch_restart_delay_after_end_secs;
        warn!(
            "Watch stream for {} ended, restarting in {} seconds...",
            kind, delay_secs
        );
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(Duration::from_secs(delay_secs)) => {}
        }
    }

    info!("Watch loop for {} stopped", kind);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(generation: i64) -> Option<Fingerprint> {
        Some(Fingerprint {
            generation: Some(generation),
            ..Fingerprint::default()
        })
    }

    #[test]
    fn test_filter_drops_repeats() {
        let mut filter = ChangeFilter::default();
        let key = ObjectKey::namespaced("team-a", "alice");
        assert!(filter.changed(&key, fingerprint(1)));
        assert!(!filter.changed(&key, fingerprint(1)));
        assert!(filter.changed(&key, fingerprint(2)));
        assert!(filter.changed(&ObjectKey::namespaced("team-b", "alice"), fingerprint(2)));
    }

    #[test]
    fn test_filter_forgets_removed_records() {
        let mut filter = ChangeFilter::default();
        let key = ObjectKey::namespaced("team-a", "alice");
        assert!(filter.changed(&key, fingerprint(1)));
        let removed = Fingerprint {
            generation: Some(1),
            deleting: true,
            ..Fingerprint::default()
        };
        assert!(filter.changed(&key, Some(removed)));
        assert!(filter.seen.is_empty());

        // Same name recreated later starts over
        assert!(filter.changed(&key, fingerprint(1)));
    }

    #[test]
    fn test_filter_passes_derived_events() {
        let mut filter = ChangeFilter::default();
        let key = ObjectKey::cluster("default");
        assert!(filter.changed(&key, None));
        assert!(filter.changed(&key, None));
    }
}
