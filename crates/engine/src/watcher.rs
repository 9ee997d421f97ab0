use crate::brokerage::Brokerage;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior, interval};

/// Re-runs the limit-order matching pass on a fixed period.
///
/// The core has no scheduler of its own; this is the optional driver used by
/// long-running front ends. Each tick is one `check_limit_orders` call, and a
/// failing pass is logged and retried on the next tick.
pub struct LimitOrderWatcher {
    brokerage: Arc<Brokerage>,
    period: Duration,
}

impl LimitOrderWatcher {
    pub fn new(brokerage: Arc<Brokerage>, period: Duration) -> Self {
        Self { brokerage, period }
    }

    /// Runs until `shutdown` flips to `true`. Returns the total number of
    /// orders executed.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> usize {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut total = 0;

        tracing::info!(period_secs = self.period.as_secs(), "Limit order watcher started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.brokerage.check_limit_orders().await {
                        Ok(executed) => total += executed,
                        Err(e) => tracing::error!(error = %e, "Limit order pass failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(total, "Limit order watcher stopped");
        total
    }
}
