//! Background task that runs reconciliation cycles on an interval.

use super::engine::ReconciliationEngine;
use rpsls_ledger::LedgerClient;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Handle to a running poll loop. Dropping it stops the loop.
pub struct Poller {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Start polling now and then every `every`
    pub fn spawn<L: LedgerClient + 'static>(engine: ReconciliationEngine<L>, every: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            // A slow cycle delays the next one instead of bunching them up.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_ms = every.as_millis() as u64, "poller started");

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                if *shutdown_rx.borrow() {
                    break;
                }

                let report = engine.poll_once().await;
                debug!(
                    changed = report.changed.len(),
                    skipped = report.skipped.len(),
                    "poll cycle finished"
                );
            }

            info!("poller stopped");
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Schedule no further cycles. Returns immediately; an in-flight cycle
    /// runs to completion.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Whether the loop task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Stop and wait for the loop to exit
    pub async fn join(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::state::ClientState;
    use crate::store::GameStore;
    use rpsls_ledger::{Address, MockLedger};
    use std::sync::Arc;

    fn engine() -> ReconciliationEngine<rpsls_ledger::MockLedgerClient> {
        let ledger = MockLedger::new();
        let state = ClientState::new(
            ledger.connect(Address::random()),
            GameStore::in_memory(),
            Arc::new(ledger.clock()),
            ClientConfig::default(),
        );
        ReconciliationEngine::new(Arc::new(state))
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_loop() {
        let poller = Poller::spawn(engine(), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(!poller.is_finished());

        poller.stop();
        assert!(poller.is_stopped());
        for _ in 0..10 {
            if poller.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(poller.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_after_stop() {
        let poller = Poller::spawn(engine(), Duration::from_secs(1));
        poller.stop();
        poller.join().await;
    }
}
