//! Background eviction of idle counters.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::controller::AdmissionController;

/// Periodically purges idle counters from a shared controller.
///
/// Runs as a tokio task until [`Sweeper::shutdown`] is called. The sweep goes
/// through the controller's own locking, so it never races the request path.
pub struct Sweeper {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn the sweep loop on the current tokio runtime.
    pub fn spawn<C: Clock + 'static>(
        controller: Arc<AdmissionController<C>>,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        info!(interval_ms = interval.as_millis() as u64, "Starting counter sweeper");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = controller.sweep();
                        debug!(
                            purged = purged,
                            live = controller.counter_count(),
                            "Sweep completed"
                        );
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!("Counter sweeper stopped");
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Stop the sweep loop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Counter sweeper task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{AdmissionPolicy, ManualClock};

    #[tokio::test]
    async fn test_sweeper_purges_idle_counters() {
        let clock = ManualClock::new(0);
        let policy = AdmissionPolicy::new(Duration::from_millis(100), 5)
            .unwrap()
            .with_retention_windows(2);
        let controller = Arc::new(AdmissionController::with_clock(policy, clock.clone()));

        controller.check("idle-client").unwrap();
        assert_eq!(controller.counter_count(), 1);

        let sweeper = Sweeper::spawn(Arc::clone(&controller), Duration::from_millis(10));

        clock.set(1_000);
        let purged = tokio::time::timeout(Duration::from_secs(2), async {
            while controller.counter_count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(purged.is_ok(), "sweeper never purged the idle counter");

        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweeper_keeps_active_counters() {
        let clock = ManualClock::new(0);
        let policy = AdmissionPolicy::new(Duration::from_secs(60), 5).unwrap();
        let controller = Arc::new(AdmissionController::with_clock(policy, clock.clone()));

        controller.check("active-client").unwrap();
        let sweeper = Sweeper::spawn(Arc::clone(&controller), Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(controller.counter_count(), 1);

        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let policy = AdmissionPolicy::new(Duration::from_secs(1), 1).unwrap();
        let controller = Arc::new(AdmissionController::new(policy));
        let sweeper = Sweeper::spawn(Arc::clone(&controller), Duration::from_secs(3600));

        tokio::time::timeout(Duration::from_secs(1), sweeper.shutdown())
            .await
            .expect("shutdown should not wait for the next tick");
        // The task released its handle on the controller
        assert_eq!(Arc::strong_count(&controller), 1);
    }
}
