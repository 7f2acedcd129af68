//! Periodic reconciliation of pending payments.
//!
//! The sweeper is the safety net behind webhooks: any payment still `created`
//! (confirmation raced, webhook missed or simulated away) is driven through
//! the same update path until it reaches a terminal status.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::services::payment_service::PaymentService;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// How often the worker wakes up to reconcile pending payments.
    pub interval: Duration,
    pub enabled: bool,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
            enabled: true,
        }
    }
}

impl SweeperConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.interval = Duration::from_secs(
            std::env::var("SWEEP_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(cfg.interval.as_secs()),
        );
        cfg.enabled = std::env::var("SWEEPER_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .to_lowercase()
            != "false";
        cfg
    }
}

/// Counts for one sweep cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub attempted: usize,
    pub updated: usize,
    pub failed: usize,
}

pub struct PaymentSweeper {
    service: Arc<PaymentService>,
    config: SweeperConfig,
}

impl PaymentSweeper {
    pub fn new(service: Arc<PaymentService>, config: SweeperConfig) -> Self {
        Self { service, config }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "payment sweeper started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("payment sweeper stopping");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.interval) => {
                    let stats = self.tick().await;
                    if stats.attempted > 0 {
                        info!(
                            attempted = stats.attempted,
                            updated = stats.updated,
                            failed = stats.failed,
                            "sweep cycle finished"
                        );
                    }
                }
            }
        }

        info!("payment sweeper stopped");
    }

    /// Reconcile every pending payment once.
    ///
    /// Per-item failures are logged and skipped so one bad payment never
    /// stalls the rest; the item stays `created` and is retried next tick.
    pub async fn tick(&self) -> SweepStats {
        let pending = match self.service.pending_payments().await {
            Ok(pending) => pending,
            Err(e) => {
                error!(error = %e, "failed to list pending payments");
                return SweepStats::default();
            }
        };

        let mut stats = SweepStats {
            attempted: pending.len(),
            ..SweepStats::default()
        };

        for payment in pending {
            match self.service.update_payment_status(&payment.payment_id).await {
                Ok(updated) => {
                    stats.updated += 1;
                    info!(
                        payment_id = %updated.payment_id,
                        status = %updated.status,
                        "sweeper reconciled payment"
                    );
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(
                        payment_id = %payment.payment_id,
                        error = %e,
                        "sweeper failed to update payment"
                    );
                }
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::payment_repository::PaymentStatus;
    use crate::test_util::{InMemoryPaymentStore, ScriptedProcessor};

    fn make_sweeper(
        store: Arc<InMemoryPaymentStore>,
        processor: Arc<ScriptedProcessor>,
    ) -> PaymentSweeper {
        let service = Arc::new(PaymentService::new(store, processor, 50));
        PaymentSweeper::new(service, SweeperConfig::default())
    }

    #[tokio::test]
    async fn tick_reconciles_every_pending_payment() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let processor = Arc::new(ScriptedProcessor::new());
        for id in ["pi_1", "pi_2", "pi_3"] {
            store.seed(id, PaymentStatus::Created);
            processor.set_status(id, "succeeded");
        }
        let sweeper = make_sweeper(store.clone(), processor);

        let stats = sweeper.tick().await;

        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.updated, 3);
        assert_eq!(stats.failed, 0);
        for id in ["pi_1", "pi_2", "pi_3"] {
            assert_eq!(store.get(id).unwrap().status, "succeeded");
        }
    }

    #[tokio::test]
    async fn one_failing_item_does_not_stop_the_sweep() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let processor = Arc::new(ScriptedProcessor::new());
        for id in ["pi_1", "pi_2", "pi_3"] {
            store.seed(id, PaymentStatus::Created);
            processor.set_status(id, "succeeded");
        }
        processor.fail_retrieve_for("pi_2");
        let sweeper = make_sweeper(store.clone(), processor.clone());

        let stats = sweeper.tick().await;

        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.updated, 2);
        assert_eq!(stats.failed, 1);
        // every item was attempted, including the one after the failure
        assert_eq!(processor.retrieve_call_count(), 3);
        assert_eq!(store.get("pi_1").unwrap().status, "succeeded");
        assert_eq!(store.get("pi_2").unwrap().status, "created");
        assert_eq!(store.get("pi_3").unwrap().status, "succeeded");
    }

    #[tokio::test]
    async fn failed_item_remains_pending_and_retries_next_tick() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let processor = Arc::new(ScriptedProcessor::new());
        store.seed("pi_1", PaymentStatus::Created);
        processor.fail_retrieve_for("pi_1");
        let sweeper = make_sweeper(store.clone(), processor.clone());

        let first = sweeper.tick().await;
        assert_eq!(first.failed, 1);
        assert_eq!(store.get("pi_1").unwrap().status, "created");

        // processor recovers; the next tick picks the payment up again
        let recovered = Arc::new(ScriptedProcessor::new());
        recovered.set_status("pi_1", "succeeded");
        let sweeper = make_sweeper(store.clone(), recovered);
        let second = sweeper.tick().await;
        assert_eq!(second.updated, 1);
        assert_eq!(store.get("pi_1").unwrap().status, "succeeded");
    }

    #[tokio::test]
    async fn terminal_payments_are_not_swept() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let processor = Arc::new(ScriptedProcessor::new());
        store.seed("pi_done", PaymentStatus::Succeeded);
        store.seed("pi_lost", PaymentStatus::Failed);
        let sweeper = make_sweeper(store, processor.clone());

        let stats = sweeper.tick().await;

        assert_eq!(stats.attempted, 0);
        assert_eq!(processor.retrieve_call_count(), 0);
    }

    #[test]
    fn config_defaults_to_twenty_seconds() {
        let config = SweeperConfig::default();
        assert_eq!(config.interval, Duration::from_secs(20));
        assert!(config.enabled);
    }
}
