//! Fan-out of one worker per intent, joined on a completion barrier.

use std::sync::Arc;

use chrono::Utc;
use secrecy::SecretString;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::app::shutdown::Shutdown;
use crate::app::worker::{TransferWorker, WorkerConfig};
use crate::domain::{
    BatchReport, NetworkGateway, TransferIntent, TransferOutcome, TransferResult, ValidationError,
};

/// Runs a batch of independent transfers concurrently
pub struct Orchestrator {
    worker: Arc<TransferWorker>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(gateway: Arc<dyn NetworkGateway>, config: &WorkerConfig) -> Self {
        Self {
            worker: Arc::new(TransferWorker::new(gateway, *config)),
        }
    }

    /// Run every intent to a terminal result and aggregate.
    ///
    /// All workers start immediately; the report is produced only after the
    /// last one finishes. Intents not yet started when shutdown fires are
    /// reported as `Cancelled` without touching the gateway.
    pub async fn run_all(&self, intents: Vec<TransferIntent>, shutdown: Shutdown) -> BatchReport {
        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        let start = Instant::now();
        let total = intents.len();
        let span = info_span!("batch", run_id = %run_id, transfers = total);

        if intents.is_empty() {
            span.in_scope(|| info!("No transfers supplied, nothing to do"));
            return BatchReport::new(run_id, started_at, start.elapsed(), Vec::new());
        }

        span.in_scope(|| info!("Starting bulk transfer of {} transactions", total));

        let (tx, mut rx) = mpsc::unbounded_channel::<TransferResult>();
        let mut handles = Vec::with_capacity(total);

        for (index, intent) in intents.into_iter().enumerate() {
            let amount = intent.amount;

            if shutdown.is_triggered() {
                let _ = tx.send(TransferResult {
                    index,
                    source: None,
                    destination: None,
                    amount,
                    signature: None,
                    outcome: TransferOutcome::Cancelled,
                    elapsed: std::time::Duration::ZERO,
                });
                continue;
            }

            let worker = Arc::clone(&self.worker);
            let tx = tx.clone();
            let shutdown = shutdown.clone();
            let worker_span = info_span!(parent: &span, "transfer", index);
            let handle = tokio::spawn(
                async move {
                    let result = worker.run(index, &intent, shutdown).await;
                    // receiver lives until every sender is dropped
                    let _ = tx.send(result);
                }
                .instrument(worker_span),
            );
            handles.push((index, amount, handle));
        }
        drop(tx);

        let mut results = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            debug!(
                parent: &span,
                index = result.index,
                outcome = %result.outcome,
                elapsed_ms = result.elapsed.as_millis() as u64,
                "Transfer finished"
            );
            results.push(result);
        }

        // A worker that panicked dropped its sender without a result
        if results.len() < total {
            let mut seen = vec![false; total];
            for result in &results {
                seen[result.index] = true;
            }
            for (index, amount, handle) in handles {
                if seen[index] {
                    continue;
                }
                let reason = match handle.await {
                    Err(e) => format!("worker aborted: {}", e),
                    Ok(()) => "worker produced no result".to_string(),
                };
                error!(parent: &span, index, reason = %reason, "Transfer worker lost");
                results.push(TransferResult {
                    index,
                    source: None,
                    destination: None,
                    amount,
                    signature: None,
                    outcome: TransferOutcome::PrecursorFailed(reason),
                    elapsed: start.elapsed(),
                });
            }
        }

        let report = BatchReport::new(run_id, started_at, start.elapsed(), results);
        if let Some(stats) = report.stats() {
            info!(
                parent: &span,
                confirmed = stats.confirmed,
                failed = stats.failed(),
                wall_clock_ms = report.wall_clock.as_millis() as u64,
                "Bulk transfer complete"
            );
        }
        report
    }
}

/// Pair sources with destinations by position.
///
/// Sources beyond the end of the destination list all pay the first
/// destination. Extra destinations are ignored.
pub fn pair_sources(
    sources: Vec<SecretString>,
    destinations: &[String],
    amount: u64,
) -> Result<Vec<TransferIntent>, ValidationError> {
    if sources.is_empty() {
        return Ok(Vec::new());
    }
    let Some(first) = destinations.first() else {
        return Err(ValidationError::InvalidField {
            field: "to_addresses".to_string(),
            message: "at least one destination is required".to_string(),
        });
    };

    if sources.len() > destinations.len() {
        warn!(
            sources = sources.len(),
            destinations = destinations.len(),
            first_destination = %first,
            "More sources than destinations; extra sources pay the first destination"
        );
    }

    Ok(sources
        .into_iter()
        .enumerate()
        .map(|(i, key)| {
            let destination = destinations.get(i).unwrap_or(first);
            TransferIntent::new(key, destination.clone(), amount)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::shutdown::shutdown_channel;
    use crate::test_utils::{MockGateway, test_intent, test_source_key};

    fn orchestrator(gateway: Arc<MockGateway>) -> Orchestrator {
        Orchestrator::new(gateway as Arc<dyn NetworkGateway>, &WorkerConfig::default())
    }

    #[tokio::test]
    async fn test_empty_batch_is_explicit_empty_report() {
        let gateway = Arc::new(MockGateway::new());
        let (_trigger, shutdown) = shutdown_channel();

        let report = orchestrator(gateway.clone()).run_all(vec![], shutdown).await;

        assert!(report.is_empty());
        assert!(report.results.is_empty());
        assert_eq!(gateway.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_result_per_intent_in_intent_order() {
        let gateway = Arc::new(MockGateway::new());
        let (_trigger, shutdown) = shutdown_channel();
        let intents: Vec<_> = (1..=5).map(|a| test_intent(a).0).collect();

        let report = orchestrator(gateway).run_all(intents, shutdown).await;

        assert_eq!(report.results.len(), 5);
        for (i, result) in report.results.iter().enumerate() {
            assert_eq!(result.index, i);
            assert_eq!(result.amount, i as u64 + 1);
        }
        assert!(report.all_confirmed());
        assert_eq!(report.stats().unwrap().confirmed, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_isolated() {
        let gateway = Arc::new(MockGateway::new());
        let (_trigger, shutdown) = shutdown_channel();
        let (good, _, _) = test_intent(10);
        let (mut bad, _, _) = test_intent(10);
        bad.destination = "###".to_string();

        let report = orchestrator(gateway.clone())
            .run_all(vec![good, bad], shutdown)
            .await;

        assert_eq!(report.results[0].outcome, TransferOutcome::Confirmed);
        assert!(matches!(
            report.results[1].outcome,
            TransferOutcome::PrecursorFailed(_)
        ));
        assert_eq!(gateway.submit_calls(), 1);
        assert!(!report.all_confirmed());
    }

    #[tokio::test]
    async fn test_pre_cancelled_batch_never_calls_gateway() {
        let gateway = Arc::new(MockGateway::new());
        let (trigger, shutdown) = shutdown_channel();
        trigger.trigger();
        let intents: Vec<_> = (0..3).map(|_| test_intent(10).0).collect();

        let report = orchestrator(gateway.clone()).run_all(intents, shutdown).await;

        assert_eq!(report.results.len(), 3);
        assert!(
            report
                .results
                .iter()
                .all(|r| r.outcome == TransferOutcome::Cancelled)
        );
        assert_eq!(gateway.total_calls(), 0);
    }

    #[test]
    fn test_pairing_by_position() {
        let sources: Vec<_> = (0..3).map(|_| test_source_key().0).collect();
        let destinations = vec!["A".to_string(), "B".to_string(), "C".to_string()];

        let intents = pair_sources(sources, &destinations, 7).unwrap();

        let paired: Vec<_> = intents.iter().map(|i| i.destination.as_str()).collect();
        assert_eq!(paired, vec!["A", "B", "C"]);
        assert!(intents.iter().all(|i| i.amount == 7));
    }

    #[test]
    fn test_pairing_extra_sources_use_first_destination() {
        let sources: Vec<_> = (0..4).map(|_| test_source_key().0).collect();
        let destinations = vec!["A".to_string(), "B".to_string()];

        let intents = pair_sources(sources, &destinations, 1).unwrap();

        let paired: Vec<_> = intents.iter().map(|i| i.destination.as_str()).collect();
        assert_eq!(paired, vec!["A", "B", "A", "A"]);
    }

    #[test]
    fn test_pairing_extra_destinations_ignored() {
        let sources = vec![test_source_key().0];
        let destinations = vec!["A".to_string(), "B".to_string()];

        let intents = pair_sources(sources, &destinations, 1).unwrap();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].destination, "A");
    }

    #[test]
    fn test_pairing_requires_a_destination() {
        let sources = vec![test_source_key().0];
        assert!(pair_sources(sources, &[], 1).is_err());
        assert!(pair_sources(vec![], &[], 1).unwrap().is_empty());
    }
}
